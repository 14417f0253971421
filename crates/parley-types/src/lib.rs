//! Shared types and constants for the Parley voice platform.
//!
//! This crate provides the foundational types used across the Parley crates:
//! participant identities, the deterministic identity-to-room mapping, and the
//! control signals a client sends over the room data channel to drive the
//! agent's turn-taking.
//!
//! Nothing here performs I/O. The credential issuer (`parley-voice`) and the
//! agent coordinator (`parley-agent`) only meet through these types and the
//! room namespace.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

mod signal;
pub use signal::{ControlSignal, TurnState, UnknownSignal};

/// Prefix prepended to an identity to form its room name.
pub const ROOM_PREFIX: &str = "voice-";

/// Prefix used for server-generated identities.
pub const GENERATED_IDENTITY_PREFIX: &str = "user-";

/// Errors raised when constructing domain values from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The identity was empty or whitespace-only.
    #[error("identity must not be empty")]
    EmptyIdentity,
}

/// An opaque participant identity.
///
/// Either supplied by the caller or generated as `user-<uuid v4>`. The only
/// constraint on caller-supplied values is that they are not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Validates a caller-supplied identity.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::EmptyIdentity`] if the value is empty or only
    /// whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TypeError::EmptyIdentity);
        }
        Ok(Self(value))
    }

    /// Generates a fresh identity backed by a random v4 UUID.
    pub fn generate() -> Self {
        Self(format!("{}{}", GENERATED_IDENTITY_PREFIX, Uuid::new_v4()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the human-readable label shown to other room participants.
    pub fn display_name(&self) -> String {
        format!("User {}", self.0)
    }

    /// Returns the room this identity owns.
    ///
    /// The mapping is deterministic: the same identity always lands in the
    /// same room, which is what lets a client reconnect to a session that is
    /// still in progress.
    pub fn room_name(&self) -> RoomName {
        RoomName(format!("{}{}", ROOM_PREFIX, self.0))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a real-time room, always `voice-<identity>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Returns the room name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recovers the owning identity from a room name.
    ///
    /// Returns `None` for rooms that were not derived from an identity.
    pub fn owner(&self) -> Option<Identity> {
        self.0
            .strip_prefix(ROOM_PREFIX)
            .and_then(|rest| Identity::new(rest).ok())
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RoomName> for String {
    fn from(room: RoomName) -> Self {
        room.0
    }
}
