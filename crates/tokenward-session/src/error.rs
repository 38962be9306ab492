//! Error types for the session layer.

/// Errors produced anywhere in the session lifecycle.
///
/// Commands on the auth client return these as plain values inside a
/// `Result`, so callers can inspect failures with a `match` instead of
/// unwinding. The type is `Clone` because the same error is recorded in
/// the published state, broadcast to event subscribers, and returned to
/// the caller that issued the command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The identity provider rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request was malformed before it reached the provider
    /// (for example an empty email).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider could not be reached or answered with a server error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The access or refresh token has expired.
    #[error("token expired")]
    TokenExpired,

    /// The refresh token was revoked or is unknown to the provider.
    #[error("token revoked")]
    TokenRevoked,

    /// Sign-out found nothing to sign out. Treated as success by
    /// the auth client.
    #[error("already signed out")]
    AlreadySignedOut,

    /// A session value is missing required parts (empty token, no user id).
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Sign-in was requested while a session is already active.
    #[error("already signed in")]
    AlreadySignedIn,

    /// The command needs an active session and there is none.
    #[error("not signed in")]
    NotSignedIn,

    /// The command needs a started client.
    #[error("client has not been started")]
    NotStarted,

    /// `start` was requested on a client that already left idle.
    #[error("client already started")]
    AlreadyStarted,

    /// The client was stopped. Pending and late results are discarded.
    #[error("client stopped")]
    Stopped,
}

impl AuthError {
    /// Returns `true` if this error means the current session can never
    /// be renewed and must be dropped.
    ///
    /// Transport failures are transient and keep the session.
    pub fn forces_sign_out(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired | Self::TokenRevoked | Self::InvalidCredentials
        )
    }
}

/// Errors from encoding or decoding a session for hand-off.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes are not a valid session.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
