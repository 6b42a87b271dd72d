//! Shared types for the Lotkeeper slot lifecycle coordinator.

mod bill;
mod booking;
mod log;
mod pricing;
mod session;
mod slot;
mod ws;

pub use bill::*;
pub use booking::*;
pub use log::*;
pub use pricing::*;
pub use session::*;
pub use slot::*;
pub use ws::*;
