//! HTTP route handlers.

pub mod bills;
pub mod bookings;
pub mod logs;
pub mod pricing;
pub mod sessions;
pub mod slots;

use axum::{http::StatusCode, Json};
use lotkeeper_core::LotError;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Map a domain error onto the HTTP surface: missing things are 404,
/// lost races and rejected transitions are 409, the rest is 500.
pub(crate) fn api_error(e: LotError) -> (StatusCode, String) {
    let status = match &e {
        LotError::UnknownSlot(_)
        | LotError::SessionNotFound(_)
        | LotError::BookingNotFound(_) => StatusCode::NOT_FOUND,
        LotError::SlotUnavailable(_)
        | LotError::SessionNotActive(_)
        | LotError::InvalidBookingTransition { .. }
        | LotError::SourceNotFinalized(_)
        | LotError::DuplicateBill(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
