//! Integration tests for the HTTP lifecycle surface.
//!
//! These tests drive full walk-in and booking flows through the router
//! and verify slot state, billing idempotence and error mapping.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use lotkeeper_server::{config::Config, state::AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Create a minimal test app for integration testing.
fn create_test_app() -> (Router, Arc<AppState>, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        db_path: temp_dir.path().join("test.db"),
        slot_ids: ["A1", "A2", "A3", "B1"].into_iter().map(String::from).collect(),
    };

    let state = Arc::new(AppState::new(config).expect("Failed to create AppState"));
    let app = lotkeeper_server::app(state.clone());

    (app, state, temp_dir)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

fn walkin_body(slot_id: &str) -> Value {
    json!({
        "user_name": "Asha",
        "phone": "9876543210",
        "vehicle_number": "tn01ab1234",
        "vehicle_type": "Car",
        "slot_id": slot_id,
        "payment_method": "Cash",
        "duration_type": "known",
        "duration_label": "2 Hours",
    })
}

fn booking_body(slot_id: &str) -> Value {
    json!({
        "user_name": "Ravi",
        "phone": "9123456780",
        "vehicle_number": "ka05mn4321",
        "vehicle_type": "Car",
        "slot_id": slot_id,
        "duration_label": "2 Hours",
        "payment_status": "paid",
    })
}

#[tokio::test]
async fn health_endpoint() {
    let (app, _state, _dir) = create_test_app();
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn walkin_flow_over_http() {
    let (app, _state, _dir) = create_test_app();

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/pricing",
        Some(json!({"duration_label": "2 Hours", "price": 45.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, session) = send(&app, Method::POST, "/api/sessions", Some(walkin_body("A3"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["amount"], 45.0);
    assert_eq!(session["vehicle_number"], "TN01AB1234");
    assert_eq!(session["payment_status"], "pending");
    let session_id = session["session_id"].as_str().unwrap().to_string();

    // The slot monitor reflects the occupancy.
    let (status, slots) = send(&app, Method::GET, "/api/slots", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots["available_count"], 3);
    let a3 = slots["slots"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["slot_id"] == "A3")
        .unwrap();
    assert_eq!(a3["occupied"], true);

    // A second vehicle cannot take the same slot.
    let (status, _) = send(&app, Method::POST, "/api/sessions", Some(walkin_body("A3"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, ended) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{session_id}/end"),
        Some(json!({"final_amount": 45.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["payment_status"], "paid");
    assert!(ended["exit_time"].is_string());

    // Ending again is a conflict, not a second release.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{session_id}/end"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Exactly one bill.
    let (status, bill) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{session_id}/bill"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bill["type"], "walkin");
    assert_eq!(bill["amount"], 45.0);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{session_id}/bill"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, bills) = send(&app, Method::GET, "/api/bills", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bills.as_array().unwrap().len(), 1);

    // Today's activity log has the closed-out visit.
    let (status, logs) = send(&app, Method::GET, "/api/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0]["exit_time"].is_string());
}

#[tokio::test]
async fn booking_flow_over_http() {
    let (app, _state, _dir) = create_test_app();
    send(
        &app,
        Method::PUT,
        "/api/pricing",
        Some(json!({"duration_label": "2 Hours", "price": 45.0})),
    )
    .await;

    let (status, booking) = send(&app, Method::POST, "/api/bookings", Some(booking_body("B1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["amount"], 45.0);
    let booking_id = booking["booking_id"].as_str().unwrap().to_string();
    let token = booking["qr_token"].as_str().unwrap().to_string();

    // The reservation blocks walk-ins.
    let (status, _) = send(&app, Method::POST, "/api/sessions", Some(walkin_body("B1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // QR check-in resolves the booking.
    let (status, verified) = send(
        &app,
        Method::POST,
        "/api/bookings/verify",
        Some(json!({"token": token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["booking_id"].as_str(), Some(booking_id.as_str()));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/bookings/verify",
        Some(json!({"token": "bogus"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Completion before confirmation is rejected.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{booking_id}/end"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, confirmed) = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{booking_id}/status"),
        Some(json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, completed) = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{booking_id}/end"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");

    // The slot is free again.
    let (_, slot) = send(&app, Method::GET, "/api/slots/B1", None).await;
    assert_eq!(slot["booked"], false);
    assert_eq!(slot["occupied"], false);

    let (status, bill) = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{booking_id}/bill"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bill["type"], "booked");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{booking_id}/bill"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Status filter on the listing.
    let (status, completed_list) =
        send(&app, Method::GET, "/api/bookings?status=completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed_list.as_array().unwrap().len(), 1);
    let (_, pending_list) = send(&app, Method::GET, "/api/bookings?status=pending", None).await;
    assert!(pending_list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn occupancy_and_override_routes() {
    let (app, _state, _dir) = create_test_app();

    let (status, slot) = send(
        &app,
        Method::POST,
        "/api/slots/A1/occupancy",
        Some(json!({"occupied": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["occupied"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/slots/Z9/occupancy",
        Some(json!({"occupied": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Force-available override clears everything.
    let (status, slot) = send(
        &app,
        Method::POST,
        "/api/slots/A1/override",
        Some(json!({"force_available": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["occupied"], false);
    assert_eq!(slot["booked"], false);

    let (_, available) = send(&app, Method::GET, "/api/slots/available", None).await;
    assert_eq!(available.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn unknown_resources_are_404() {
    let (app, _state, _dir) = create_test_app();
    let missing = uuid::Uuid::new_v4();

    let (status, _) = send(&app, Method::GET, "/api/slots/Z9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{missing}/end"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &format!("/api/bookings/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &format!("/api/bills/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let (app, _state, _dir) = create_test_app();
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/pricing",
        Some(json!({"duration_label": "1 Hour", "price": -5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
