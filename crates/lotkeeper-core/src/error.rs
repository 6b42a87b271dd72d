//! Error types for Lotkeeper.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LotError {
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session not active: {0}")]
    SessionNotActive(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Invalid booking transition: {from} -> {to}")]
    InvalidBookingTransition { from: String, to: String },

    #[error("Source not finalized for billing: {0}")]
    SourceNotFinalized(Uuid),

    #[error("Bill already generated for {0}")]
    DuplicateBill(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
