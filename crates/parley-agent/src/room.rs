//! Room transport boundary.
//!
//! The agent never talks to a media server directly. It sees a room through
//! [`RoomHandle`]: membership, data packets, and audio frames come in as
//! [`RoomEvent`]s, and synthesized speech goes out through `publish_audio`.
//!
//! [`ChannelRoom`] implements the trait on top of tokio channels. A host
//! bridging a real transport feeds events into its [`RoomRemote`] and drains
//! the agent's output from it; tests do the same.

use crate::audio::AudioBuffer;
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Default capacity for the inbound room event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened in the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    ParticipantJoined { identity: String },
    ParticipantLeft { identity: String },
    /// A packet on the room data channel.
    Data {
        participant: Option<String>,
        payload: Vec<u8>,
    },
    /// A frame of a participant's audio track.
    Audio {
        participant: String,
        frame: AudioBuffer,
    },
    /// The transport dropped the agent from the room.
    Disconnected,
}

#[async_trait]
pub trait RoomHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Binds the agent's audio input/output to the room under `persona`.
    async fn attach(&self, persona: &str) -> Result<(), TransportError>;

    async fn connect(&self) -> Result<(), TransportError>;

    /// Waits for the next event. `None` once the room is gone.
    async fn next_event(&self) -> Option<RoomEvent>;

    /// Hands `audio` to the transport. Returns once it is queued, not once
    /// it has played; playback runs for `audio.duration()` afterwards and
    /// can be cut short with [`clear_audio`](Self::clear_audio).
    async fn publish_audio(&self, audio: AudioBuffer) -> Result<(), TransportError>;

    /// Drops any queued or playing agent audio.
    async fn clear_audio(&self) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

/// Everything the agent did to a [`ChannelRoom`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutput {
    Attached { persona: String },
    Connected,
    Audio(AudioBuffer),
    AudioCleared,
    Disconnected,
}

/// Far end of a [`ChannelRoom`].
#[derive(Debug)]
pub struct RoomRemote {
    pub events: mpsc::Sender<RoomEvent>,
    pub output: mpsc::UnboundedReceiver<RoomOutput>,
}

impl RoomRemote {
    /// Delivers an event to the agent. Returns `false` if the room is gone.
    pub async fn send(&self, event: RoomEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Sends a raw data-channel packet from `participant`.
    pub async fn send_data(&self, participant: &str, payload: impl Into<Vec<u8>>) -> bool {
        self.send(RoomEvent::Data {
            participant: Some(participant.to_string()),
            payload: payload.into(),
        })
        .await
    }

    pub async fn send_audio(&self, participant: &str, frame: AudioBuffer) -> bool {
        self.send(RoomEvent::Audio {
            participant: participant.to_string(),
            frame,
        })
        .await
    }

    pub async fn next_output(&mut self) -> Option<RoomOutput> {
        self.output.recv().await
    }
}

/// A room backed by in-process channels.
#[derive(Debug)]
pub struct ChannelRoom {
    name: String,
    events: Mutex<mpsc::Receiver<RoomEvent>>,
    output: mpsc::UnboundedSender<RoomOutput>,
    attached: AtomicBool,
    connected: AtomicBool,
}

impl ChannelRoom {
    pub fn pair(name: impl Into<String>) -> (Arc<Self>, RoomRemote) {
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let room = Arc::new(Self {
            name: name.into(),
            events: Mutex::new(events_rx),
            output: output_tx,
            attached: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        });

        (
            room,
            RoomRemote {
                events: events_tx,
                output: output_rx,
            },
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, output: RoomOutput) -> Result<(), TransportError> {
        self.output.send(output).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl RoomHandle for ChannelRoom {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attach(&self, persona: &str) -> Result<(), TransportError> {
        self.emit(RoomOutput::Attached {
            persona: persona.to_string(),
        })
        .map_err(|e| TransportError::Attach(e.to_string()))?;
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if !self.attached.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!(
                "no session attached to room '{}'",
                self.name
            )));
        }

        info!(room = %self.name, "agent connecting to room");
        self.emit(RoomOutput::Connected)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&self) -> Option<RoomEvent> {
        self.events.lock().await.recv().await
    }

    async fn publish_audio(&self, audio: AudioBuffer) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected(self.name.clone()));
        }

        debug!(
            room = %self.name,
            samples = audio.len(),
            "agent publishing audio"
        );
        self.emit(RoomOutput::Audio(audio))
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn clear_audio(&self) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected(self.name.clone()));
        }
        self.emit(RoomOutput::AudioCleared)
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(room = %self.name, "agent disconnecting from room");
            let _ = self.emit(RoomOutput::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_requires_attach() {
        let (room, _remote) = ChannelRoom::pair("voice-a");
        assert!(matches!(
            room.connect().await,
            Err(TransportError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let (room, _remote) = ChannelRoom::pair("voice-a");
        let result = room.publish_audio(AudioBuffer::default()).await;
        assert!(matches!(result, Err(TransportError::NotConnected(name)) if name == "voice-a"));
    }

    #[tokio::test]
    async fn outputs_arrive_in_order() {
        let (room, mut remote) = ChannelRoom::pair("voice-b");
        room.attach("assistant").await.unwrap();
        room.connect().await.unwrap();
        room.publish_audio(AudioBuffer::from_samples(vec![1, 2, 3], 16_000))
            .await
            .unwrap();
        room.clear_audio().await.unwrap();
        room.disconnect().await;
        room.disconnect().await;

        assert_eq!(
            remote.next_output().await,
            Some(RoomOutput::Attached {
                persona: "assistant".to_string()
            })
        );
        assert_eq!(remote.next_output().await, Some(RoomOutput::Connected));
        assert!(matches!(remote.next_output().await, Some(RoomOutput::Audio(a)) if a.len() == 3));
        assert_eq!(remote.next_output().await, Some(RoomOutput::AudioCleared));
        assert_eq!(remote.next_output().await, Some(RoomOutput::Disconnected));
        assert!(remote.output.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_are_delivered() {
        let (room, remote) = ChannelRoom::pair("voice-c");
        assert!(remote.send_data("alice", br#"{"type":"interrupt"}"#.to_vec()).await);
        drop(remote);

        assert!(matches!(
            room.next_event().await,
            Some(RoomEvent::Data { participant: Some(p), .. }) if p == "alice"
        ));
        assert_eq!(room.next_event().await, None);
    }
}
