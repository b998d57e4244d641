//! axum-native WebSocket integration: upgrade handling, token
//! validation, and the read-pump/write-pump pair per connection.
//!
//! Grounded on the `mmogr-gglib` voice-audio-ws handler: split the
//! socket, spawn an ingest (read) task and an egress (write) task, race
//! them with `tokio::select!`, and always run connection teardown on
//! whichever side finishes first.

use crate::error::CLOSE_CODE_UNAUTHORIZED;
use crate::handlers::HandlerContext;
use crate::hub::Hub;
use crate::messages::ClientFrame;
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use sidechain_common::{ConnectionId, UserId};
use std::sync::Arc;

/// Validates the `token` query parameter on upgrade. Authentication
/// token issuance and the OAuth dance are out of scope (spec §1) — this
/// is the narrow collaborator seam the HTTP edge's auth system plugs
/// into.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<UserId>;
}

/// A validator that accepts any non-empty token and derives a stable
/// user id from it, for tests and local wiring.
pub struct EchoTokenValidator;

#[async_trait]
impl TokenValidator for EchoTokenValidator {
    async fn validate(&self, token: &str) -> Option<UserId> {
        if token.is_empty() {
            return None;
        }
        uuid::Uuid::parse_str(token).ok().map(UserId::from_uuid)
    }
}

/// `GET /ws?token=...` — call from the binary's router with the hub and
/// a validator already resolved from request state.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    token: Option<String>,
    hub: Arc<Hub>,
    validator: Arc<dyn TokenValidator>,
) -> Response {
    let Some(token) = token else {
        return unauthorized_response();
    };
    let Some(user_id) = validator.validate(&token).await else {
        return unauthorized_response();
    };

    ws.on_upgrade(move |socket| handle_connection(socket, hub, user_id)).into_response()
}

fn unauthorized_response() -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        format!("invalid token, close code {CLOSE_CODE_UNAUTHORIZED}"),
    )
        .into_response()
}

async fn handle_connection(socket: WebSocket, hub: Arc<Hub>, user_id: UserId) {
    let connection_id = ConnectionId::new();
    let mut outbound_rx = hub.register(connection_id, user_id).await;
    tracing::info!(%connection_id, %user_id, "connection registered");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let shutdown = hub.shutdown_token();
    let read_idle = hub.config.read_idle;
    let write_idle = hub.config.write_idle;
    let max_frame_bytes = hub.config.max_frame_bytes;

    let read_hub = hub.clone();
    let read_shutdown = shutdown.clone();
    let mut read_pump = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = read_shutdown.cancelled() => break,
                _ = tokio::time::sleep(read_idle) => {
                    tracing::info!(%connection_id, "read-pump idle timeout");
                    break;
                }
                frame = ws_receiver.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > max_frame_bytes {
                        tracing::warn!(%connection_id, "frame exceeds max size, dropping");
                        continue;
                    }
                    read_hub.touch_heartbeat(connection_id).await;
                    match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(client_frame) => {
                            let ctx = HandlerContext {
                                connection_id,
                                user_id,
                            };
                            read_hub.dispatch_client_frame(&ctx, &client_frame).await;
                        }
                        Err(e) => {
                            tracing::warn!(%connection_id, error = %e, "malformed client frame");
                        }
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    read_hub.touch_heartbeat(connection_id).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::info!(%connection_id, error = %e, "read error, closing");
                    break;
                }
                _ => {}
            }
        }
    });

    let write_shutdown = shutdown.clone();
    let mut write_pump = tokio::spawn(async move {
        let mut ping_timer = tokio::time::interval(write_idle);
        ping_timer.tick().await;
        loop {
            tokio::select! {
                _ = write_shutdown.cancelled() => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code: 1000,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break;
                }
                _ = ping_timer.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                msg = outbound_rx.recv() => {
                    match msg {
                        Some(server_msg) => {
                            if ws_sender.send(Message::Text(server_msg.to_json().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_pump => { write_pump.abort(); }
        _ = &mut write_pump => { read_pump.abort(); }
    }

    hub.unregister(connection_id, user_id).await;
    tracing::info!(%connection_id, %user_id, "connection closed");
}
