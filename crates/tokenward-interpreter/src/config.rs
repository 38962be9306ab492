//! Interpreter configuration and command inputs.

use chrono::{DateTime, Utc};
use tokenward_refresh::RefreshConfig;
use tokenward_session::{AuthError, Codec, CodecError, JsonCodec, Session, User};

// ---------------------------------------------------------------------------
// InterpreterConfig
// ---------------------------------------------------------------------------

/// Configuration for one interpreter.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Refresh scheduling. `refresh.enabled = false` turns off automatic
    /// refresh, including the one-time refresh of an expired seed.
    pub refresh: RefreshConfig,

    /// Capacity of the command queue. Commands beyond this wait for space.
    pub command_buffer: usize,

    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events (`RecvError::Lagged`).
    pub event_buffer: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig::default(),
            command_buffer: 32,
            event_buffer: 16,
        }
    }
}

impl InterpreterConfig {
    /// Clamp values that would make channel construction panic.
    pub fn validated(mut self) -> Self {
        self.command_buffer = self.command_buffer.max(1);
        self.event_buffer = self.event_buffer.max(1);
        self.refresh = self.refresh.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Email/password pair for [`sign_in`](crate::InterpreterHandle::sign_in).
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both parts must be non-empty.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidInput`] naming the empty part.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.email.trim().is_empty() {
            return Err(AuthError::InvalidInput("email must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }
        Ok(())
    }
}

// Keep passwords out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StartOptions
// ---------------------------------------------------------------------------

/// Options for [`start`](crate::InterpreterHandle::start).
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// A session obtained elsewhere (another instance, a cookie) to seed
    /// this instance with instead of signing in again.
    pub initial_session: Option<Session>,

    /// Confirm the seed's refresh token with the provider before entering
    /// `SignedIn`. The stored session is then the freshly refreshed one.
    pub verify_with_provider: bool,
}

impl StartOptions {
    /// Start seeded with `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            initial_session: Some(session),
            verify_with_provider: false,
        }
    }

    /// Start seeded with a session encoded by [`JsonCodec`].
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if `bytes` is not a session.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, CodecError> {
        let session: Session = JsonCodec.decode(bytes)?;
        Ok(Self::with_session(session))
    }

    /// Also confirm the seed with the provider.
    pub fn verified(mut self) -> Self {
        self.verify_with_provider = true;
        self
    }
}

// ---------------------------------------------------------------------------
// AuthEvent
// ---------------------------------------------------------------------------

/// Lifecycle events broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session was established by sign-in or seeding.
    SignedIn { user: User },

    /// The session ended. `forced` is `true` when the system ended it
    /// (refresh rejected) rather than the caller.
    SignedOut { forced: bool },

    /// The access token was replaced by a refresh.
    TokenRefreshed { expires_at: DateTime<Utc> },

    /// A refresh failed. Followed by `SignedOut { forced: true }` when the
    /// error ends the session.
    RefreshFailed { error: AuthError },

    /// The provider could not invalidate the refresh token during sign-out.
    /// The local session was cleared anyway.
    RemoteSignOutFailed { error: AuthError },
}
