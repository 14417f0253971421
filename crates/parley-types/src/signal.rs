//! Turn-taking control signals and state.
//!
//! Clients drive the manual discipline by publishing small JSON packets on
//! the room data channel, for example `{"type": "start_listening"}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A control signal sent by the client over the room data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlSignal {
    /// Begin capturing the user's utterance.
    StartListening,
    /// Stop capturing and submit the utterance for a reply.
    StopListening,
    /// Halt any agent speech and start capturing again (barge-in).
    Interrupt,
}

/// A data packet that did not decode into a [`ControlSignal`].
///
/// Carries the raw payload (lossily decoded) for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown control signal: {0}")]
pub struct UnknownSignal(pub String);

impl ControlSignal {
    /// Decodes a data-channel payload.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownSignal`] for malformed JSON or an unrecognized `type`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, UnknownSignal> {
        serde_json::from_slice(payload)
            .map_err(|_| UnknownSignal(String::from_utf8_lossy(payload).into_owned()))
    }

    /// Returns the wire name of this signal.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartListening => "start_listening",
            Self::StopListening => "stop_listening",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit turn state tracked by the manual discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Waiting for the user to start a turn.
    #[default]
    Idle,
    /// Capturing the user's utterance.
    Listening,
    /// Transcribing, completing, and synthesizing a reply.
    Processing,
    /// Playing synthesized speech into the room.
    Speaking,
}

impl TurnState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
