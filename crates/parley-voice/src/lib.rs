//! Room credential issuance for the Parley platform.
//!
//! Mints LiveKit access tokens that bind one identity to its own room
//! (`voice-<identity>`) with join, publish, subscribe, and data-publish
//! grants. Tokens live for a fixed 30 minutes and are never revoked; the
//! transport verifies them, this crate only signs them.
//!
//! Optionally each token carries an agent dispatch directive so LiveKit
//! starts the voice agent as soon as the participant joins.

pub mod config;
pub mod error;
pub mod issuer;

pub use config::{
    AgentDispatchConfig, LiveKitConfig, DEFAULT_AGENT_NAME, DEFAULT_DISPATCH_METADATA,
};
pub use error::VoiceError;
pub use issuer::{CredentialIssuer, IssuedCredential, CREDENTIAL_TTL};
