//! Slot feed WebSocket for dashboard real-time updates.
//!
//! Every connection gets a full snapshot first, then incremental
//! `slot_changed` upserts. The subscription is opened before the snapshot
//! is taken, so a transition landing in between is delivered twice rather
//! than dropped; clients absorb duplicates through the upsert merge.

use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use lotkeeper_types::{WsClientMessage, WsServerMessage};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Handler for the slot feed WebSocket upgrade.
pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_slots_websocket(socket, state).await {
            tracing::error!(target: "lotkeeper::ws", "Slot feed WebSocket error: {}", e);
        }
    })
}

/// Handle a slot feed connection: snapshot, then stream.
pub async fn handle_slots_websocket(socket: WebSocket, state: Arc<AppState>) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before snapshotting so no transition falls in the gap.
    let mut event_rx = state.coordinator.subscribe_slots();

    let snapshot = WsServerMessage::Snapshot {
        slots: state.coordinator.slots(),
    };
    ws_tx
        .send(Message::Text(serde_json::to_string(&snapshot)?.into()))
        .await?;

    tracing::info!(target: "lotkeeper::ws", "Slot feed client connected");

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let msg = match event {
                    Ok(event) => WsServerMessage::from(event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Re-sync a slow consumer with a fresh snapshot
                        // instead of leaving it with a hole in the feed.
                        tracing::warn!(
                            target: "lotkeeper::ws",
                            skipped,
                            "slot feed client lagged, re-sending snapshot"
                        );
                        WsServerMessage::Snapshot {
                            slots: state.coordinator.slots(),
                        }
                    }
                    Err(RecvError::Closed) => break,
                };
                let json = match serde_json::to_string(&msg) {
                    Ok(j) => j,
                    Err(_) => continue,
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<WsClientMessage>(&text) {
                            Ok(WsClientMessage::Ping { timestamp }) => {
                                tracing::trace!(target: "lotkeeper::ws::ping", timestamp, "ping");
                                WsServerMessage::Pong { timestamp }
                            }
                            Err(e) => WsServerMessage::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            },
                        };
                        let json = serde_json::to_string(&reply)?;
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::info!(target: "lotkeeper::ws", "Slot feed client disconnected");
    Ok(())
}
