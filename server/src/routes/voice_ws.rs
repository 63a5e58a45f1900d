//! The telephony bridge seam.
//!
//! Whatever phone vendor fronts the shelter, its adapter speaks this
//! socket: the bridge's session token in the query, transcribed caller
//! utterances as text frames in, agent replies as text frames out, and a
//! close for hangup. Speech synthesis and recognition live on the bridge's
//! side of the line.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, info};

use crate::dto::VoiceQuery;
use crate::state::AppState;

pub async fn upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<VoiceQuery>,
    State(state): State<AppState>,
) -> Response {
    if query.session.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "detail": "session query parameter is required" })),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle(socket, state, query.session))
}

async fn handle(mut socket: WebSocket, state: AppState, token: String) {
    let Some(session) = state.sessions.create(&token) else {
        info!(call_id = %token, "call rejected: session capacity reached");
        let _ = socket
            .send(Message::Text(
                "All lines are busy right now, please call back shortly.".into(),
            ))
            .await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    if socket
        .send(Message::Text(session.open().await.into()))
        .await
        .is_err()
    {
        state.sessions.remove(&token);
        return;
    }

    let idle = state.cfg.idle_session_timeout;

    loop {
        let frame = match tokio::time::timeout(idle, socket.recv()).await {
            Ok(frame) => frame,
            Err(_) => {
                // Idle callers are let go; their hold, if committed, stays.
                info!(call_id = %token, "voice session idle timeout");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                // The utterance is awaited to completion before the next
                // frame is read, so a hangup can never abandon a tool call
                // halfway through its commit.
                for reply in session.handle_utterance(text.as_str()).await {
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }

                if session.is_ended().await {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                info!(call_id = %token, "caller hung up");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(call_id = %token, error = %e, "voice socket error");
                break;
            }
        }
    }

    state.sessions.remove(&token);
}
