//! Lotkeeper core: the slot/session/booking lifecycle coordinator.
//!
//! Every inbound event (walk-in start/end, booking confirm/end, hardware
//! occupancy toggle) enters through [`LifecycleCoordinator`], is validated
//! against the [`SlotRegistry`], applied to the relevant store, and fanned
//! out to observers on the [`ChangeBus`].

mod activity_log;
mod bill_ledger;
mod booking_store;
mod change_bus;
mod coordinator;
mod error;
mod pricing;
mod session_store;
mod slot_registry;

pub use activity_log::ActivityLog;
pub use bill_ledger::BillLedger;
pub use booking_store::{BookingFilter, BookingStore};
pub use change_bus::{ChangeBus, SLOTS_TOPIC};
pub use coordinator::{
    CoordinatorConfig, CreateBookingRequest, LifecycleCoordinator, StartSessionRequest,
};
pub use error::LotError;
pub use pricing::{duration_minutes_for, PricingCatalog, DEFAULT_HOURLY_RATE, HOURLY_LABEL};
pub use session_store::SessionStore;
pub use slot_registry::SlotRegistry;

pub type Result<T> = std::result::Result<T, LotError>;
