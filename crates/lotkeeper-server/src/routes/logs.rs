//! Activity log routes.

use super::api_error;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use lotkeeper_types::ActivityLogEntry;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct LogQuery {
    /// Calendar date (YYYY-MM-DD); defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ActivityLogEntry>>, (StatusCode, String)> {
    let date = query
        .date
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
    let entries = state.coordinator.logs_for_date(&date).map_err(api_error)?;

    Ok(Json(entries))
}
