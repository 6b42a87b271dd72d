//! Authoritative in-memory slot map.
//!
//! The registry is the single logical owner of slot state. It applies
//! patches, stamps `last_updated`, and publishes the full post-transition
//! snapshot. Business legality of a transition is the coordinator's job;
//! the only validation here is that the slot exists.

use crate::change_bus::{ChangeBus, SLOTS_TOPIC};
use crate::{LotError, Result};
use chrono::Utc;
use dashmap::DashMap;
use lotkeeper_types::{Slot, SlotChangeEvent, SlotPatch, TransitionCause};
use std::sync::Arc;
use tracing::debug;

pub struct SlotRegistry {
    slots: DashMap<String, Slot>,
    bus: Arc<ChangeBus>,
}

impl SlotRegistry {
    /// Seed the registry with vacant slots for the configured ids.
    pub fn new(slot_ids: &[String], bus: Arc<ChangeBus>) -> Self {
        let slots = DashMap::new();
        for id in slot_ids {
            slots.insert(id.clone(), Slot::vacant(id.clone()));
        }
        Self { slots, bus }
    }

    /// Apply a validated patch and broadcast the result. `last_updated` is
    /// always stamped here, never by the caller.
    pub fn apply_transition(
        &self,
        slot_id: &str,
        patch: SlotPatch,
        cause: TransitionCause,
    ) -> Result<Slot> {
        let snapshot = {
            let mut entry = self
                .slots
                .get_mut(slot_id)
                .ok_or_else(|| LotError::UnknownSlot(slot_id.to_string()))?;
            patch.apply_to(&mut entry);
            entry.last_updated = Utc::now();
            entry.clone()
        };

        debug!(
            target: "lotkeeper::registry",
            slot_id,
            occupied = snapshot.occupied,
            booked = snapshot.booked,
            ?cause,
            "slot transition applied"
        );
        self.bus.publish(
            SLOTS_TOPIC,
            SlotChangeEvent {
                slot: snapshot.clone(),
                cause,
            },
        );
        Ok(snapshot)
    }

    pub fn get(&self, slot_id: &str) -> Option<Slot> {
        self.slots.get(slot_id).map(|s| s.clone())
    }

    pub fn contains(&self, slot_id: &str) -> bool {
        self.slots.contains_key(slot_id)
    }

    /// Current state of every slot, ordered by id.
    pub fn snapshot(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self.slots.iter().map(|e| e.clone()).collect();
        slots.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
        slots
    }

    /// Slots with neither occupancy nor reservation.
    pub fn available(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|e| e.is_available())
            .map(|e| e.clone())
            .collect();
        slots.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
        slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
