//! Slot state and transition types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display status derived from the two occupancy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Occupied,
}

/// A single physical parking slot.
///
/// `occupied` is hardware/attendant-derived, `booked` is app-reservation
/// derived. Both may be true at once while a booked vehicle is physically
/// parked; occupancy takes display precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,
    pub occupied: bool,
    pub booked: bool,
    pub vehicle_id: Option<String>,
    pub booked_by: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Slot {
    /// A freshly provisioned, empty slot.
    pub fn vacant(slot_id: impl Into<String>) -> Self {
        Self {
            slot_id: slot_id.into(),
            occupied: false,
            booked: false,
            vehicle_id: None,
            booked_by: None,
            last_updated: Utc::now(),
        }
    }

    /// Display status is a pure function of (occupied, booked).
    pub fn status(&self) -> SlotStatus {
        if self.occupied {
            SlotStatus::Occupied
        } else if self.booked {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        }
    }

    pub fn is_available(&self) -> bool {
        !self.occupied && !self.booked
    }
}

/// Partial update applied to a slot by the registry.
///
/// Outer `None` leaves a field untouched; `vehicle_id`/`booked_by` carry a
/// nested `Option` so they can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct SlotPatch {
    pub occupied: Option<bool>,
    pub booked: Option<bool>,
    pub vehicle_id: Option<Option<String>>,
    pub booked_by: Option<Option<String>>,
}

impl SlotPatch {
    /// Mark physically occupied by a vehicle.
    pub fn occupy(vehicle_id: impl Into<String>) -> Self {
        Self {
            occupied: Some(true),
            vehicle_id: Some(Some(vehicle_id.into())),
            ..Default::default()
        }
    }

    /// Release physical occupancy, keeping any reservation.
    pub fn release_occupancy() -> Self {
        Self {
            occupied: Some(false),
            vehicle_id: Some(None),
            ..Default::default()
        }
    }

    /// Reserve for an app booking.
    pub fn book(booked_by: impl Into<String>) -> Self {
        Self {
            booked: Some(true),
            booked_by: Some(Some(booked_by.into())),
            ..Default::default()
        }
    }

    /// Release an app reservation, keeping physical occupancy.
    pub fn release_booking() -> Self {
        Self {
            booked: Some(false),
            booked_by: Some(None),
            ..Default::default()
        }
    }

    /// Clear every flag and association.
    pub fn clear_all() -> Self {
        Self {
            occupied: Some(false),
            booked: Some(false),
            vehicle_id: Some(None),
            booked_by: Some(None),
        }
    }

    /// Apply onto a slot in place. `last_updated` is the registry's job.
    pub fn apply_to(&self, slot: &mut Slot) {
        if let Some(occupied) = self.occupied {
            slot.occupied = occupied;
        }
        if let Some(booked) = self.booked {
            slot.booked = booked;
        }
        if let Some(ref vehicle_id) = self.vehicle_id {
            slot.vehicle_id = vehicle_id.clone();
        }
        if let Some(ref booked_by) = self.booked_by {
            slot.booked_by = booked_by.clone();
        }
    }
}

/// Why a transition happened. Carried on every change event so observers
/// can distinguish sensor toggles from lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    WalkInStart,
    WalkInEnd,
    BookingCreated,
    BookingCancelled,
    BookingEnd,
    OccupancyEvent,
    Override,
    Rehydrate,
}

/// Full post-transition snapshot broadcast to every observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotChangeEvent {
    pub slot: Slot,
    pub cause: TransitionCause,
}

/// The one merge rule every subscriber applies: idempotent upsert keyed by
/// slot id, last-write-wins on `last_updated` so duplicate and stale
/// redeliveries converge.
pub fn merge_slot(slots: &mut HashMap<String, Slot>, incoming: Slot) {
    match slots.get(&incoming.slot_id) {
        Some(existing) if existing.last_updated > incoming.last_updated => {}
        _ => {
            slots.insert(incoming.slot_id.clone(), incoming);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_is_pure_function_of_flags() {
        let mut slot = Slot::vacant("A1");
        assert_eq!(slot.status(), SlotStatus::Available);

        slot.booked = true;
        assert_eq!(slot.status(), SlotStatus::Booked);

        // Occupied wins even while the booking flag is still set.
        slot.occupied = true;
        assert_eq!(slot.status(), SlotStatus::Occupied);

        slot.booked = false;
        assert_eq!(slot.status(), SlotStatus::Occupied);
    }

    #[test]
    fn patch_clears_associations() {
        let mut slot = Slot::vacant("B2");
        SlotPatch::occupy("TN01AB1234").apply_to(&mut slot);
        assert!(slot.occupied);
        assert_eq!(slot.vehicle_id.as_deref(), Some("TN01AB1234"));

        SlotPatch::clear_all().apply_to(&mut slot);
        assert!(slot.is_available());
        assert!(slot.vehicle_id.is_none());
        assert!(slot.booked_by.is_none());
    }

    #[test]
    fn merge_is_last_write_wins() {
        let mut slots = HashMap::new();
        let t0 = Utc::now();

        let mut newer = Slot::vacant("A1");
        newer.occupied = false;
        newer.last_updated = t0 + Duration::seconds(5);

        let mut older = Slot::vacant("A1");
        older.occupied = true;
        older.last_updated = t0;

        // Apply newer first, then a stale redelivery of the older event.
        merge_slot(&mut slots, newer.clone());
        merge_slot(&mut slots, older);
        assert!(!slots["A1"].occupied);

        // Duplicate of the newer event is absorbed.
        merge_slot(&mut slots, newer);
        assert_eq!(slots.len(), 1);
        assert!(!slots["A1"].occupied);
    }
}
