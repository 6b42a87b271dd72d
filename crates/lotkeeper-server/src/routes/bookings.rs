//! Booking routes.

use super::api_error;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use lotkeeper_core::{BookingFilter, CreateBookingRequest};
use lotkeeper_types::{Bill, Booking, BookingStatus, PaymentStatus};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub slot_id: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, (StatusCode, String)> {
    let bookings = state
        .coordinator
        .list_bookings(&BookingFilter {
            status: query.status,
            slot_id: query.slot_id,
        })
        .map_err(api_error)?;

    Ok(Json(bookings))
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub user_name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub slot_id: String,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_label: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Booking>), (StatusCode, String)> {
    let booking = state
        .coordinator
        .create_booking(CreateBookingRequest {
            user_name: req.user_name,
            phone: req.phone,
            vehicle_number: req.vehicle_number,
            vehicle_type: req.vehicle_type,
            slot_id: req.slot_id,
            arrival_time: req.arrival_time,
            duration_label: req.duration_label,
            payment_status: req.payment_status.unwrap_or(PaymentStatus::Pending),
        })
        .await
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, (StatusCode, String)> {
    let booking = state
        .coordinator
        .booking(id)
        .map_err(api_error)?
        .ok_or((StatusCode::NOT_FOUND, "Booking not found".to_string()))?;

    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Arrival check-in: resolve a scanned QR token to its booking.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Booking>, (StatusCode, String)> {
    let booking = state
        .coordinator
        .verify_booking(&req.token)
        .map_err(api_error)?;

    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, (StatusCode, String)> {
    let booking = state
        .coordinator
        .update_booking_status(id, req.status)
        .await
        .map_err(api_error)?;

    Ok(Json(booking))
}

/// Complete a confirmed booking and release its slot.
pub async fn end(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, (StatusCode, String)> {
    let booking = state.coordinator.end_booking(id).await.map_err(api_error)?;
    Ok(Json(booking))
}

pub async fn bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Bill>), (StatusCode, String)> {
    let bill = state.coordinator.bill_booking(id).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(bill)))
}
