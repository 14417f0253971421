//! Voice agent sessions for Parley rooms.
//!
//! When a participant joins their room, an [`AgentWorker`] spawns one
//! [`AgentSession`] for it. The session attaches to the room, greets the
//! user, and then takes turns: user speech is transcribed, answered by a
//! completion engine, synthesized, and published back into the room.
//!
//! Two turn disciplines share one coordinator:
//!
//! - **Manual**: the client sends `start_listening` / `stop_listening` /
//!   `interrupt` over the room data channel and the session follows the
//!   [`TurnMachine`].
//! - **Automatic**: inbound audio runs through a noise filter, a voice
//!   activity detector, and a turn detector, which decide where user turns
//!   begin and end.
//!
//! Providers sit behind the [`Transcriber`], [`CompletionEngine`], and
//! [`Synthesizer`] traits; the room sits behind [`RoomHandle`]. The
//! `parley-agent` binary hosts a worker behind the WebSocket media bridge in
//! [`bridge`].

pub mod audio;
pub mod bridge;
pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod providers;
pub mod room;
pub mod session;
pub mod turn;
pub mod worker;

pub use audio::{AudioBuffer, DEFAULT_SAMPLE_RATE};
pub use bridge::{BridgeFrame, BridgeState};
pub use config::{
    AgentConfig, AgentSettings, BridgeConfig, CompletionConfig, DetectorConfig, Discipline,
    LoggingConfig, PipelineConfig, SettingsError, SynthesisConfig, TranscriptionConfig,
};
pub use context::{ChatMessage, ConversationContext, Role};
pub use detect::{
    DetectorOutput, Detectors, EnergyVad, NoiseFilter, NoiseGate, SilenceTurnDetector,
    TurnBoundary, TurnDetector, VoiceActivityDetector,
};
pub use error::{PipelineError, SessionError, TransportError};
pub use providers::{CompletionEngine, OpenAiClient, Pipeline, Synthesizer, Transcriber};
pub use room::{ChannelRoom, RoomEvent, RoomHandle, RoomOutput, RoomRemote};
pub use session::AgentSession;
pub use turn::{TurnEffect, TurnMachine};
pub use worker::{AgentWorker, PipelineFactory};
