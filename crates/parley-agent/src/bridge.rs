//! WebSocket media bridge.
//!
//! A media relay joins the real-time room on the user's behalf and opens one
//! WebSocket per participant at `/rooms/{room}/ws?identity=<id>`. Each
//! connection becomes a [`ChannelRoom`] handed to the [`AgentWorker`]:
//!
//! - inbound binary frames are participant audio, mono PCM16 little-endian
//!   at the configured sample rate;
//! - inbound text frames are data-channel packets, forwarded verbatim;
//! - closing the socket means the participant left.
//!
//! Agent output goes back as [`BridgeFrame`] text frames. Every agent audio
//! clip is an `audio` frame naming its sample rate, followed by one binary
//! frame with the samples.

use crate::audio::AudioBuffer;
use crate::room::{ChannelRoom, RoomEvent, RoomOutput, RoomRemote};
use crate::worker::AgentWorker;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct BridgeState {
    pub worker: AgentWorker,
    /// Sample rate of inbound participant audio.
    pub sample_rate: u32,
}

impl BridgeState {
    pub fn new(worker: AgentWorker, sample_rate: u32) -> Self {
        Self {
            worker,
            sample_rate,
        }
    }
}

/// Query parameters for a bridge connection.
#[derive(Debug, Deserialize)]
pub struct BridgeParams {
    pub identity: Option<String>,
}

/// Agent output as sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeFrame {
    Attached { persona: String },
    Connected,
    /// Header for the binary frame that follows.
    Audio { sample_rate: u32, samples: usize },
    AudioCleared,
    Disconnected,
}

pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms/{room}/ws", get(ws_handler))
        .layer(Extension(Arc::new(state)))
}

/// `GET /health`: liveness plus the rooms that currently have an agent.
pub async fn health_handler(Extension(state): Extension<Arc<BridgeState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "active_rooms": state.worker.active_rooms(),
    }))
}

pub async fn ws_handler(
    Extension(state): Extension<Arc<BridgeState>>,
    Path(room): Path<String>,
    Query(params): Query<BridgeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(identity) = params.identity.filter(|id| !id.trim().is_empty()) else {
        tracing::warn!(%room, "bridge connect missing participant identity");
        return (StatusCode::BAD_REQUEST, "identity query parameter is required").into_response();
    };

    tracing::info!(%room, %identity, "bridge connection accepted");
    ws.on_upgrade(move |socket| handle_socket(socket, state, room, identity))
}

async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>, room: String, identity: String) {
    let (mut sender, mut receiver) = socket.split();
    let (channel_room, remote) = ChannelRoom::pair(room.clone());
    let RoomRemote { events, mut output } = remote;

    let session = state.worker.on_participant_joined(channel_room, &identity);

    let send_task = tokio::spawn(async move {
        while let Some(out) = output.recv().await {
            let closing = out == RoomOutput::Disconnected;
            if forward_output(&mut sender, out).await.is_err() {
                break;
            }
            if closing {
                let _ = sender.close().await;
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let event = match msg {
            Message::Binary(bytes) => match AudioBuffer::from_pcm16_le(&bytes, state.sample_rate) {
                Some(frame) => RoomEvent::Audio {
                    participant: identity.clone(),
                    frame,
                },
                None => {
                    tracing::warn!(%room, bytes = bytes.len(), "dropping audio frame with odd length");
                    continue;
                }
            },
            Message::Text(text) => RoomEvent::Data {
                participant: Some(identity.clone()),
                payload: text.as_str().as_bytes().to_vec(),
            },
            Message::Close(_) => break,
            _ => continue,
        };
        if events.send(event).await.is_err() {
            // Session already gone.
            break;
        }
    }

    let _ = events
        .send(RoomEvent::ParticipantLeft {
            identity: identity.clone(),
        })
        .await;
    drop(events);

    if let Err(e) = session.await {
        tracing::warn!(%room, error = %e, "agent session task did not complete");
    }
    send_task.abort();
    tracing::info!(%room, %identity, "bridge connection closed");
}

async fn forward_output(
    sender: &mut SplitSink<WebSocket, Message>,
    output: RoomOutput,
) -> Result<(), axum::Error> {
    let (frame, audio) = match output {
        RoomOutput::Attached { persona } => (BridgeFrame::Attached { persona }, None),
        RoomOutput::Connected => (BridgeFrame::Connected, None),
        RoomOutput::Audio(audio) => (
            BridgeFrame::Audio {
                sample_rate: audio.sample_rate,
                samples: audio.len(),
            },
            Some(audio),
        ),
        RoomOutput::AudioCleared => (BridgeFrame::AudioCleared, None),
        RoomOutput::Disconnected => (BridgeFrame::Disconnected, None),
    };

    match serde_json::to_string(&frame) {
        Ok(text) => sender.send(Message::Text(text.into())).await?,
        Err(e) => {
            tracing::error!("failed to serialize bridge frame: {}", e);
            return Ok(());
        }
    }
    if let Some(audio) = audio {
        sender.send(Message::Binary(audio.to_pcm16_le().into())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_use_snake_case_tags() {
        let header = BridgeFrame::Audio {
            sample_rate: 24_000,
            samples: 480,
        };
        assert_eq!(
            serde_json::to_value(&header).unwrap(),
            json!({"type": "audio", "sample_rate": 24000, "samples": 480})
        );
        assert_eq!(
            serde_json::to_string(&BridgeFrame::AudioCleared).unwrap(),
            r#"{"type":"audio_cleared"}"#
        );
    }
}
