use parley_types::TypeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// Signing material is missing or unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The LiveKit SDK refused to sign the token.
    #[error("LiveKit access token error: {0}")]
    Signing(#[from] livekit_api::access_token::AccessTokenError),

    /// The caller supplied an unusable identity.
    #[error("invalid request: {0}")]
    Validation(#[from] TypeError),
}

impl VoiceError {
    /// Returns `true` when the failure was caused by the caller's input rather
    /// than by server-side configuration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
