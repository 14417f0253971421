use serde::{Deserialize, Serialize};
use std::fmt;

/// Default LiveKit agent name targeted by dispatch directives.
pub const DEFAULT_AGENT_NAME: &str = "voice-assistant";

/// Metadata attached to dispatch directives so the agent can tell where the
/// dispatch originated.
pub const DEFAULT_DISPATCH_METADATA: &str = r#"{"source":"token_server"}"#;

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

fn default_dispatch_metadata() -> String {
    DEFAULT_DISPATCH_METADATA.to_string()
}

/// Connection and signing settings for the LiveKit deployment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// Transport endpoint handed back to clients alongside their token.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Returns `true` when both halves of the signing key pair are present.
    pub fn has_signing_keys(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// Whether issued credentials should ask LiveKit to dispatch an agent into
/// the room as soon as the participant joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDispatchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Name the agent worker registered with.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Opaque metadata forwarded to the dispatched agent.
    #[serde(default = "default_dispatch_metadata")]
    pub metadata: String,
}

impl Default for AgentDispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            agent_name: default_agent_name(),
            metadata: default_dispatch_metadata(),
        }
    }
}

impl AgentDispatchConfig {
    /// An enabled dispatch directive for the given agent name.
    pub fn enabled(agent_name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            agent_name: agent_name.into(),
            metadata: default_dispatch_metadata(),
        }
    }
}
