//! WebSocket handler for real-time panel updates

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use home_core::PanelEvent;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// Messages sent to clients besides panel events
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsHello<'a> {
    Connected { devices: Option<&'a [home_core::Device]> },
}

/// First message of every connection: the current devices, or `null` while loading
fn greeting(state: &AppState) -> Result<String, serde_json::Error> {
    let devices = state.panel.mirror().devices();
    let hello = WsHello::Connected {
        devices: devices.as_deref().map(Vec::as_slice),
    };
    serde_json::to_string(&hello)
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the greeting so no change is lost in between
    let mut event_rx = state.panel.subscribe();

    let connected_msg = match greeting(&state) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode greeting: {}", e);
            return;
        }
    };
    if sender.send(Message::Text(connected_msg)).await.is_err() {
        return;
    }

    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string::<PanelEvent>(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::warn!("Failed to encode panel event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("WebSocket client lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Clients only listen; incoming text is ignored
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
}
