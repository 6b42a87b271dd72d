//! Pricing rule routes.
//!
//! Rate changes apply to sessions quoted afterwards; anything already
//! started keeps its quote, and open sessions settle at the rate in
//! effect when they end.

use super::api_error;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use lotkeeper_types::PricingRule;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PricingRule>>, (StatusCode, String)> {
    let rules = state.coordinator.pricing_rules().map_err(api_error)?;
    Ok(Json(rules))
}

#[derive(Deserialize)]
pub struct UpsertRequest {
    pub duration_label: String,
    pub price: f64,
}

pub async fn upsert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if req.price < 0.0 {
        return Err((StatusCode::BAD_REQUEST, "price must not be negative".into()));
    }

    state
        .coordinator
        .pricing()
        .upsert(&req.duration_label, req.price)
        .map_err(api_error)?;

    info!(
        target: "lotkeeper::api",
        duration_label = %req.duration_label,
        price = req.price,
        "pricing rule updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
