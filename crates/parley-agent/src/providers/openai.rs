//! OpenAI-compatible HTTP backend (Groq by default) for all three
//! capabilities.

use super::{CompletionEngine, Synthesizer, Transcriber};
use crate::audio::AudioBuffer;
use crate::config::{CompletionConfig, PipelineConfig, SynthesisConfig, TranscriptionConfig};
use crate::context::ConversationContext;
use crate::error::{PipelineError, SessionError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Maximum WAV upload for transcription (25 MiB, the provider's limit).
const MAX_TRANSCRIPTION_INPUT_BYTES: usize = 25 * 1024 * 1024;

/// Maximum text input for synthesis (10 KiB).
const MAX_SYNTHESIS_INPUT_BYTES: usize = 10 * 1024;

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    transcription: TranscriptionConfig,
    completion: CompletionConfig,
    synthesis: SynthesisConfig,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, SessionError> {
        if config.api_key.trim().is_empty() {
            return Err(SessionError::Configuration(
                "provider API key is not set (GROQ_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SessionError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            transcription: config.transcription.clone(),
            completion: config.completion.clone(),
            synthesis: config.synthesis.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turns a non-success status into a message carrying the response body.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body = %body, "provider request failed");
        Err(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, PipelineError> {
        let wav = audio
            .to_wav()
            .map_err(|e| PipelineError::Transcription(format!("failed to encode WAV: {}", e)))?;

        if wav.len() > MAX_TRANSCRIPTION_INPUT_BYTES {
            return Err(PipelineError::Transcription(format!(
                "audio exceeds maximum size: {} bytes (limit: {} bytes)",
                wav.len(),
                MAX_TRANSCRIPTION_INPUT_BYTES
            )));
        }

        let file = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.transcription.model.clone())
            .text("language", self.transcription.language.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;
        let response = Self::check_status(response)
            .await
            .map_err(PipelineError::Transcription)?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Transcription(format!("invalid response: {}", e)))?;
        let text = data
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::Transcription("response has no text".to_string()))?
            .trim()
            .to_string();

        debug!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}

#[async_trait]
impl CompletionEngine for OpenAiClient {
    async fn complete(&self, context: &ConversationContext) -> Result<String, PipelineError> {
        let mut body = json!({
            "model": self.completion.model,
            "messages": context.messages(),
        });
        if let Some(temperature) = self.completion.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.completion.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Completion(e.to_string()))?;
        let response = Self::check_status(response)
            .await
            .map_err(PipelineError::Completion)?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Completion(format!("invalid response: {}", e)))?;

        data.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| PipelineError::Completion("response has no choices".to_string()))
    }
}

#[async_trait]
impl Synthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, PipelineError> {
        if text.len() > MAX_SYNTHESIS_INPUT_BYTES {
            return Err(PipelineError::Synthesis(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_SYNTHESIS_INPUT_BYTES
            )));
        }

        let body = json!({
            "model": self.synthesis.model,
            "voice": self.synthesis.voice,
            "input": text,
            "response_format": "wav",
        });

        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;
        let response = Self::check_status(response)
            .await
            .map_err(PipelineError::Synthesis)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        AudioBuffer::from_wav(&bytes)
            .map_err(|e| PipelineError::Synthesis(format!("failed to decode WAV: {}", e)))
    }
}
