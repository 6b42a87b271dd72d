//! Walk-in session routes.

use super::api_error;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lotkeeper_core::StartSessionRequest;
use lotkeeper_types::{Bill, DurationType, WalkInSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<WalkInSession>,
    pub active_count: usize,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionListResponse>, (StatusCode, String)> {
    let sessions = state.coordinator.all_sessions().map_err(api_error)?;
    let active_count = sessions.iter().filter(|s| s.is_active()).count();

    Ok(Json(SessionListResponse {
        sessions,
        active_count,
    }))
}

pub async fn list_active(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WalkInSession>>, (StatusCode, String)> {
    let sessions = state.coordinator.active_sessions().map_err(api_error)?;
    Ok(Json(sessions))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    pub payment_method: String,
    pub duration_type: DurationType,
    #[serde(default)]
    pub duration_label: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<WalkInSession>), (StatusCode, String)> {
    let session = state
        .coordinator
        .start_session(StartSessionRequest {
            user_name: req.user_name,
            phone: req.phone,
            vehicle_number: req.vehicle_number,
            vehicle_type: req.vehicle_type,
            slot_id: req.slot_id,
            payment_method: req.payment_method,
            duration_type: req.duration_type,
            duration_label: req.duration_label,
        })
        .await
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WalkInSession>, (StatusCode, String)> {
    let session = state
        .coordinator
        .session(id)
        .map_err(api_error)?
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;

    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct EndSessionRequest {
    /// Attendant-entered settlement; open sessions fall back to the
    /// current hourly rate when absent.
    #[serde(default)]
    pub final_amount: Option<f64>,
}

pub async fn end(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<WalkInSession>, (StatusCode, String)> {
    let session = state
        .coordinator
        .end_session(id, req.final_amount)
        .await
        .map_err(api_error)?;

    Ok(Json(session))
}

pub async fn bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Bill>), (StatusCode, String)> {
    let bill = state.coordinator.bill_session(id).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(bill)))
}
