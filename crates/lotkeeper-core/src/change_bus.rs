//! Topic-keyed pub/sub fan-out for slot changes.
//!
//! Delivery is at-least-once: a lagging receiver may observe replays, so
//! subscribers apply events with the idempotent `merge_slot` upsert rather
//! than assuming exactly-once delivery.

use dashmap::DashMap;
use lotkeeper_types::SlotChangeEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Topic the registry publishes every slot mutation on.
pub const SLOTS_TOPIC: &str = "slots";

const CHANNEL_CAPACITY: usize = 256;

/// Single-writer, multi-reader broadcast bus. Order is preserved per topic
/// per publisher; no total order is promised across topics.
pub struct ChangeBus {
    topics: DashMap<String, broadcast::Sender<SlotChangeEvent>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<SlotChangeEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to a topic. Events published before this call are not
    /// replayed; consumers start from a snapshot and upsert from there.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<SlotChangeEvent> {
        self.sender(topic).subscribe()
    }

    /// Publish to all current subscribers of the topic. Returns the number
    /// of receivers the event was delivered to (zero is not an error).
    pub fn publish(&self, topic: &str, event: SlotChangeEvent) -> usize {
        let delivered = self.sender(topic).send(event).unwrap_or(0);
        trace!(target: "lotkeeper::bus", topic, delivered, "published slot change");
        delivered
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lotkeeper_types::{merge_slot, Slot, TransitionCause};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn event(slot_id: &str, occupied: bool) -> SlotChangeEvent {
        let mut slot = Slot::vacant(slot_id);
        slot.occupied = occupied;
        SlotChangeEvent {
            slot,
            cause: TransitionCause::OccupancyEvent,
        }
    }

    #[tokio::test]
    async fn preserves_per_topic_order() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe(SLOTS_TOPIC);

        bus.publish(SLOTS_TOPIC, event("A1", true));
        bus.publish(SLOTS_TOPIC, event("A1", false));

        assert!(rx.recv().await.unwrap().slot.occupied);
        assert!(!rx.recv().await.unwrap().slot.occupied);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = ChangeBus::new();
        assert_eq!(bus.publish(SLOTS_TOPIC, event("A1", true)), 0);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = ChangeBus::new();
        let mut slots_rx = bus.subscribe(SLOTS_TOPIC);
        let mut other_rx = bus.subscribe("audit");

        bus.publish(SLOTS_TOPIC, event("A2", true));
        assert_eq!(slots_rx.recv().await.unwrap().slot.slot_id, "A2");
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn duplicate_redelivery_converges_by_last_updated() {
        // {A1, occupied=true} then {A1, occupied=false}, with the first
        // event redelivered after the second.
        let t0 = Utc::now();
        let mut first = Slot::vacant("A1");
        first.occupied = true;
        first.last_updated = t0;
        let mut second = Slot::vacant("A1");
        second.occupied = false;
        second.last_updated = t0 + Duration::milliseconds(10);

        let mut view = HashMap::new();
        merge_slot(&mut view, first.clone());
        merge_slot(&mut view, second);
        merge_slot(&mut view, first); // stale redelivery

        assert!(!view["A1"].occupied);
    }

    proptest! {
        /// Any interleaving (with duplicates) of distinctly-timestamped
        /// events converges to the freshest snapshot per slot.
        #[test]
        fn upsert_merge_converges(order in proptest::collection::vec(0usize..12, 1..64)) {
            let t0 = Utc::now();
            let events: Vec<Slot> = (0..12)
                .map(|i| {
                    let mut slot = Slot::vacant(if i % 3 == 0 { "A1" } else if i % 3 == 1 { "A2" } else { "B1" });
                    slot.occupied = i % 2 == 0;
                    slot.last_updated = t0 + Duration::seconds(i as i64);
                    slot
                })
                .collect();

            let mut view = HashMap::new();
            for &idx in &order {
                merge_slot(&mut view, events[idx].clone());
            }

            for (slot_id, merged) in &view {
                let freshest = order
                    .iter()
                    .map(|&idx| &events[idx])
                    .filter(|s| &s.slot_id == slot_id)
                    .max_by_key(|s| s.last_updated)
                    .unwrap();
                prop_assert_eq!(merged.last_updated, freshest.last_updated);
                prop_assert_eq!(merged.occupied, freshest.occupied);
            }
        }
    }
}
