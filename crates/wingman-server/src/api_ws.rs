//! Voice session WebSocket handler.
//!
//! One connection is one [`Session`]. Client frames are JSON text messages
//! parsed into [`ClientEvent`]s; the session's outbound events are
//! serialized by a forwarding task that owns the socket's write half.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use wingman_pipeline::Session;
use wingman_types::{ClientEvent, ErrorKind, ServerEvent};

/// Message returned for frames that are not a valid client event.
pub const INVALID_MESSAGE: &str = "Invalid message format";

/// Query parameters for `/ws/voice`.
#[derive(Debug, Deserialize)]
pub struct VoiceConnectParams {
    /// Interview to attach to. Without it the session runs in free mode.
    #[serde(rename = "interviewId")]
    pub interview_id: Option<String>,
}

/// Upgrades to a voice session.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<VoiceConnectParams>,
) -> impl IntoResponse {
    let interview_id = params.interview_id.filter(|id| !id.trim().is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, interview_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, interview_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let session = Session::new(state.services.clone(), state.options.clone(), tx);
    let session_id = session.id();
    tracing::info!(
        %session_id,
        interview_id = interview_id.as_deref().unwrap_or("<free>"),
        "voice session connected"
    );

    // Forward session events to the websocket sender
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(%session_id, kind = event.kind(), "failed to serialize server event: {}", e);
                    continue;
                }
            };
            if sender.send(AxumMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    session.init(interview_id.as_deref()).await;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => session.handle(event),
                Err(e) => {
                    tracing::warn!(%session_id, error = %e, "failed to parse client event");
                    session.send_error(ErrorKind::BadRequest, INVALID_MESSAGE);
                }
            },
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    session.close();
    send_task.abort();
    tracing::info!(%session_id, "voice session disconnected");
}
