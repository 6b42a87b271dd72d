//! Billing ledger routes. Read-only; bills are cut through the session
//! and booking endpoints.

use super::api_error;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lotkeeper_types::Bill;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Bill>>, (StatusCode, String)> {
    let bills = state.coordinator.bills().map_err(api_error)?;
    Ok(Json(bills))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Bill>, (StatusCode, String)> {
    let bill = state
        .coordinator
        .bill(id)
        .map_err(api_error)?
        .ok_or((StatusCode::NOT_FOUND, "Bill not found".to_string()))?;

    Ok(Json(bill))
}
