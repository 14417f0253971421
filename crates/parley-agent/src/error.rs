//! Error types for agent sessions.

use thiserror::Error;

/// A capability provider failed while serving a turn.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("completion failed: {0}")]
    Completion(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("voice activity detection failed: {0}")]
    Detection(String),
}

/// The room transport rejected an operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("agent is not connected to room '{0}'")]
    NotConnected(String),

    #[error("failed to attach session to room: {0}")]
    Attach(String),

    #[error("failed to connect to room: {0}")]
    Connect(String),

    #[error("failed to publish audio: {0}")]
    Publish(String),

    #[error("room transport closed")]
    Closed,
}

/// Terminal outcome of a failed session attempt.
///
/// Never retried here; supervision belongs to whatever hosts the worker.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Provider credentials or settings are missing or invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
