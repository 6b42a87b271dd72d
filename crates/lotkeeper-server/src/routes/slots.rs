//! Slot monitor routes.

use super::api_error;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lotkeeper_types::{Slot, SlotPatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Serialize)]
pub struct SlotListResponse {
    pub slots: Vec<Slot>,
    pub available_count: usize,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SlotListResponse>, (StatusCode, String)> {
    let slots = state.coordinator.slots();
    let available_count = slots.iter().filter(|s| s.is_available()).count();

    Ok(Json(SlotListResponse {
        slots,
        available_count,
    }))
}

pub async fn available(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Slot>>, (StatusCode, String)> {
    Ok(Json(state.coordinator.available_slots()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Slot>, (StatusCode, String)> {
    let slot = state
        .coordinator
        .slot(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown slot: {id}")))?;

    Ok(Json(slot))
}

#[derive(Deserialize)]
pub struct OccupancyRequest {
    pub occupied: bool,
}

/// Hardware sensor or attendant toggle for physical occupancy.
pub async fn occupancy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OccupancyRequest>,
) -> Result<Json<Slot>, (StatusCode, String)> {
    let slot = state
        .coordinator
        .record_occupancy(&id, req.occupied)
        .await
        .map_err(api_error)?;

    Ok(Json(slot))
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    /// Clear every flag, releasing the slot unconditionally.
    #[serde(default)]
    pub force_available: bool,
    #[serde(default)]
    pub occupied: Option<bool>,
    #[serde(default)]
    pub booked: Option<bool>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub booked_by: Option<String>,
}

/// Admin override for desync recovery. Does not touch sessions or
/// bookings; stale records are resolved through their own endpoints.
pub async fn admin_override(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<Slot>, (StatusCode, String)> {
    let patch = if req.force_available {
        SlotPatch::clear_all()
    } else {
        SlotPatch {
            occupied: req.occupied,
            booked: req.booked,
            vehicle_id: req.vehicle_id.map(Some),
            booked_by: req.booked_by.map(Some),
        }
    };

    info!(target: "lotkeeper::api", slot_id = %id, "admin slot override");
    let slot = state
        .coordinator
        .apply_override(&id, patch)
        .await
        .map_err(api_error)?;

    Ok(Json(slot))
}
