//! Dashboard socket: engine change events plus staff chat relay.
//!
//! The socket begins with a snapshot so a reconnecting dashboard never has
//! to reason about what it missed; if the broadcast buffer laps a slow
//! subscriber, it gets told to resync and a fresh snapshot follows.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use common::time::now_ms;
use engine::notify::ChangeEvent;

use crate::dto::{ChatFrame, TokenQuery};
use crate::state::AppState;

pub async fn upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Response {
    // Dashboards authenticate out of band; the socket only checks that a
    // token came along at all.
    if query.token.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "detail": "token query parameter is required" })),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(mut socket: WebSocket, state: AppState) {
    // Subscribe before the snapshot so no transition can fall in the gap
    // between the two.
    let mut events = state.notifier.subscribe();

    if send_snapshot(&mut socket, &state).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if send_json(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "dashboard subscriber lagged; resnapshotting");
                    let resync = json!({ "event": "resync", "missed": missed });
                    if send_json(&mut socket, &resync).await.is_err()
                        || send_snapshot(&mut socket, &state).await.is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChatFrame>(text.as_str()) {
                        Ok(frame) => {
                            // Relay through the notifier so every dashboard,
                            // including this one, sees the same stream.
                            state.notifier.publish(ChangeEvent::ChatMessage {
                                sender: frame.sender,
                                body: frame.body,
                                sent_at_ms: now_ms(),
                            });
                        }
                        Err(e) => {
                            debug!(error = %e, "ignoring malformed chat frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "dashboard socket error");
                    break;
                }
            },
        }
    }
}

async fn send_snapshot(socket: &mut WebSocket, state: &AppState) -> Result<(), ()> {
    let beds = state.service.bed_snapshot().await.map_err(|_| ())?;
    let reservations = state.service.list_active(now_ms()).await.map_err(|_| ())?;

    let snapshot = json!({
        "event": "snapshot",
        "beds": beds,
        "reservations": reservations,
    });
    send_json(socket, &snapshot).await
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|_| ())
}
