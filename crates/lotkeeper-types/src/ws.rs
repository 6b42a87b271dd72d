//! WebSocket message protocol between observers and the server.

use crate::{Slot, SlotChangeEvent, TransitionCause};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Ping for keepalive.
    Ping { timestamp: u64 },
}

/// Messages sent from server to client.
///
/// Consumers treat every `SlotChanged` as a full-state upsert keyed by slot
/// id (see `merge_slot`); duplicates and replays must be safely absorbed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// Full slot map sent once on connect.
    Snapshot { slots: Vec<Slot> },
    /// Incremental upsert for one slot.
    SlotChanged { slot: Slot, cause: TransitionCause },
    /// Pong response.
    Pong { timestamp: u64 },
    /// Non-fatal error surfaced to the client.
    Error { code: String, message: String },
}

impl From<SlotChangeEvent> for WsServerMessage {
    fn from(event: SlotChangeEvent) -> Self {
        WsServerMessage::SlotChanged {
            slot: event.slot,
            cause: event.cause,
        }
    }
}
