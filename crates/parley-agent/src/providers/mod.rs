//! Capability providers behind the reply pipeline.

pub mod openai;

use crate::audio::AudioBuffer;
use crate::config::PipelineConfig;
use crate::context::ConversationContext;
use crate::error::{PipelineError, SessionError};
use async_trait::async_trait;
use std::sync::Arc;

pub use openai::OpenAiClient;

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, PipelineError>;
}

/// Produces the agent's next reply from the conversation so far.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(&self, context: &ConversationContext) -> Result<String, PipelineError>;
}

/// Text to speech.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, PipelineError>;
}

/// The three provider handles one session works with.
#[derive(Clone)]
pub struct Pipeline {
    pub transcriber: Arc<dyn Transcriber>,
    pub completion: Arc<dyn CompletionEngine>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        completion: Arc<dyn CompletionEngine>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            transcriber,
            completion,
            synthesizer,
        }
    }

    /// Builds all three capabilities on one OpenAI-compatible client.
    ///
    /// Fails with [`SessionError::Configuration`] when no API key is set.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SessionError> {
        let client = Arc::new(OpenAiClient::new(config)?);
        Ok(Self::new(client.clone(), client.clone(), client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_configuration_error() {
        let config = PipelineConfig::default();
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn pipeline_builds_with_key() {
        let config = PipelineConfig {
            api_key: "gsk_test".to_string(),
            ..Default::default()
        };
        assert!(Pipeline::from_config(&config).is_ok());
    }
}
