use crate::config::{AgentDispatchConfig, LiveKitConfig};
use crate::error::VoiceError;
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_protocol::{RoomAgentDispatch, RoomConfiguration};
use parley_types::{Identity, RoomName};
use std::time::Duration;

/// Lifetime of every issued credential. Not caller-configurable.
pub const CREDENTIAL_TTL: Duration = Duration::from_secs(1800);

/// A freshly minted room credential together with everything a client needs
/// to use it.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Signed LiveKit access token (JWT).
    pub token: String,
    pub identity: Identity,
    pub room_name: RoomName,
    /// Transport endpoint the client should connect to.
    pub server_url: String,
    pub ttl: Duration,
    /// Whether the token carries an agent dispatch directive.
    pub agent_dispatched: bool,
}

/// Mints room-scoped credentials.
///
/// Stateless apart from its configuration; safe to share across request
/// handlers without locking.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    config: LiveKitConfig,
    dispatch: AgentDispatchConfig,
}

impl CredentialIssuer {
    pub fn new(config: LiveKitConfig) -> Self {
        Self {
            config,
            dispatch: AgentDispatchConfig::default(),
        }
    }

    /// Embeds an agent dispatch directive in every credential when
    /// `dispatch.enabled` is set.
    pub fn with_agent_dispatch(mut self, dispatch: AgentDispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.config.url
    }

    pub fn dispatches_agent(&self) -> bool {
        self.dispatch.enabled
    }

    /// Issues a credential for `identity`, generating one when absent or
    /// empty.
    ///
    /// # Errors
    ///
    /// - [`VoiceError::Validation`] if the supplied identity is only
    ///   whitespace.
    /// - [`VoiceError::Configuration`] if the signing keys are missing.
    /// - [`VoiceError::Signing`] if the token cannot be signed.
    pub fn issue(&self, identity: Option<String>) -> Result<IssuedCredential, VoiceError> {
        let identity = match identity.filter(|value| !value.is_empty()) {
            Some(value) => Identity::new(value)?,
            None => Identity::generate(),
        };

        if !self.config.has_signing_keys() {
            return Err(VoiceError::Configuration(
                "LiveKit API key and secret must both be set to issue credentials".to_string(),
            ));
        }

        let room_name = identity.room_name();

        let mut token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(identity.as_str())
            .with_name(&identity.display_name())
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(CREDENTIAL_TTL);

        if self.dispatch.enabled {
            token = token.with_room_config(RoomConfiguration {
                agents: vec![RoomAgentDispatch {
                    agent_name: self.dispatch.agent_name.clone(),
                    metadata: self.dispatch.metadata.clone(),
                }],
                ..Default::default()
            });
        }

        let token = token.to_jwt()?;

        tracing::debug!(
            identity = %identity,
            room = %room_name,
            agent_dispatched = self.dispatch.enabled,
            "issued room credential"
        );

        Ok(IssuedCredential {
            token,
            identity,
            room_name,
            server_url: self.config.url.clone(),
            ttl: CREDENTIAL_TTL,
            agent_dispatched: self.dispatch.enabled,
        })
    }
}
