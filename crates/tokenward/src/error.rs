//! Unified error type for the Tokenward client.

use tokenward_session::{AuthError, CodecError};

/// Top-level error that wraps the layer-specific errors.
///
/// Lifecycle commands return [`AuthError`] directly. This type shows up
/// where a call can fail in more than one layer, such as seeding a client
/// from encoded bytes (decode, then start). The `#[from]` attribute on each
/// variant lets `?` convert either error automatically.
#[derive(Debug, thiserror::Error)]
pub enum TokenwardError {
    /// A session lifecycle error (credentials, tokens, state).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A session hand-off error (encode, decode).
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TokenwardError {
    /// The lifecycle error, if this is one.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e) => Some(e),
            Self::Codec(_) => None,
        }
    }
}
