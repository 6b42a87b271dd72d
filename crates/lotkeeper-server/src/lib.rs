//! Lotkeeper server library - HTTP/WebSocket surface over the lifecycle
//! coordinator.
//!
//! This library provides the HTTP routes, the slot-feed WebSocket handler,
//! and application state. It's separated from main.rs to enable integration
//! testing.

pub mod config;
pub mod logging;
pub mod routes;
pub mod slots_ws;
pub mod state;

pub use state::AppState;

use axum::{routing::get, routing::post, routing::put, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the full application router over shared state.
pub fn app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Slot monitor
        .route("/slots", get(routes::slots::list))
        .route("/slots/available", get(routes::slots::available))
        .route("/slots/{id}", get(routes::slots::get))
        .route("/slots/{id}/occupancy", post(routes::slots::occupancy))
        .route("/slots/{id}/override", post(routes::slots::admin_override))
        // Walk-in sessions
        .route("/sessions", get(routes::sessions::list))
        .route("/sessions", post(routes::sessions::create))
        .route("/sessions/active", get(routes::sessions::list_active))
        .route("/sessions/{id}", get(routes::sessions::get))
        .route("/sessions/{id}/end", post(routes::sessions::end))
        .route("/sessions/{id}/bill", post(routes::sessions::bill))
        // Bookings
        .route("/bookings", get(routes::bookings::list))
        .route("/bookings", post(routes::bookings::create))
        .route("/bookings/verify", post(routes::bookings::verify))
        .route("/bookings/{id}", get(routes::bookings::get))
        .route("/bookings/{id}/status", put(routes::bookings::update_status))
        .route("/bookings/{id}/end", post(routes::bookings::end))
        .route("/bookings/{id}/bill", post(routes::bookings::bill))
        // Billing ledger
        .route("/bills", get(routes::bills::list))
        .route("/bills/{id}", get(routes::bills::get))
        // Pricing rules
        .route("/pricing", get(routes::pricing::list))
        .route("/pricing", put(routes::pricing::upsert))
        // Activity log
        .route("/logs", get(routes::logs::list))
        .route("/health", get(routes::health));

    let ws_routes = Router::new().route("/slots", get(slots_ws::upgrade));

    Router::new()
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
