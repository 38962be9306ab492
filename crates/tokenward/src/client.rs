//! `AuthClient` builder and facade.
//!
//! This is the entry point for applications. It ties together the layers:
//! transport → interpreter → session store, and exposes synchronous
//! queries next to the asynchronous lifecycle commands.

use std::sync::Arc;
use std::time::Duration;

use tokenward_interpreter::{
    AuthEvent, AuthState, Credentials, InterpreterConfig, InterpreterHandle, SessionState,
    StartOptions, spawn_interpreter,
};
use tokenward_refresh::RefreshConfig;
use tokenward_session::{AuthError, Codec, JsonCodec, Session, User};
use tokenward_transport::AuthTransport;
use tokio::sync::broadcast;

use crate::TokenwardError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for one [`AuthClient`].
#[derive(Debug, Clone)]
pub struct AuthClientConfig {
    /// Start as soon as the client is built. When `false` the client stays
    /// idle until [`AuthClient::start`] is called, which is how a client is
    /// seeded with a session obtained elsewhere. Default: `true`.
    pub auto_start: bool,

    /// Refresh the access token shortly before it expires. Default: `true`.
    pub auto_refresh: bool,

    /// How long before expiry the automatic refresh fires. Default: 60 s.
    pub refresh_lead: Duration,

    /// Shortest delay before an automatic refresh, also used as the retry
    /// delay after a transient refresh failure. Default: 1 s.
    pub refresh_min_delay: Duration,

    /// Commands that can wait in the queue before callers wait for space.
    pub command_buffer: usize,

    /// Events a slow subscriber can fall behind before it misses some.
    pub event_buffer: usize,
}

impl Default for AuthClientConfig {
    fn default() -> Self {
        let interpreter = InterpreterConfig::default();
        let refresh = RefreshConfig::default();
        Self {
            auto_start: true,
            auto_refresh: refresh.enabled,
            refresh_lead: refresh.lead,
            refresh_min_delay: refresh.min_delay,
            command_buffer: interpreter.command_buffer,
            event_buffer: interpreter.event_buffer,
        }
    }
}

impl AuthClientConfig {
    fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            refresh: RefreshConfig {
                enabled: self.auto_refresh,
                lead: self.refresh_lead,
                min_delay: self.refresh_min_delay,
            },
            command_buffer: self.command_buffer,
            event_buffer: self.event_buffer,
        }
        .validated()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and spawning an [`AuthClient`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tokenward::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = MemoryProvider::new();
/// provider.add_user("alice@example.com", "password123");
///
/// let client = AuthClient::builder()
///     .refresh_lead(Duration::from_secs(120))
///     .build(provider);
///
/// client.sign_in("alice@example.com", "password123").await.unwrap();
/// assert!(client.is_authenticated());
/// # }
/// ```
pub struct AuthClientBuilder {
    config: AuthClientConfig,
    initial_session: Option<Session>,
    verify_with_provider: bool,
}

impl AuthClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: AuthClientConfig::default(),
            initial_session: None,
            verify_with_provider: false,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: AuthClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets whether the client starts as soon as it is built.
    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.config.auto_start = auto_start;
        self
    }

    /// Sets whether access tokens are refreshed automatically.
    pub fn auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.config.auto_refresh = auto_refresh;
        self
    }

    /// Sets how long before expiry the automatic refresh fires.
    pub fn refresh_lead(mut self, lead: Duration) -> Self {
        self.config.refresh_lead = lead;
        self
    }

    /// Sets the shortest delay before an automatic refresh.
    pub fn refresh_min_delay(mut self, min_delay: Duration) -> Self {
        self.config.refresh_min_delay = min_delay;
        self
    }

    /// Sets the command queue capacity.
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.config.command_buffer = capacity;
        self
    }

    /// Seeds the automatic start with a session obtained elsewhere.
    /// Only used when `auto_start` is on.
    pub fn initial_session(mut self, session: Session) -> Self {
        self.initial_session = Some(session);
        self
    }

    /// Confirms the initial session with the provider during start.
    pub fn verify_with_provider(mut self, verify: bool) -> Self {
        self.verify_with_provider = verify;
        self
    }

    /// Spawns the client's interpreter on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build(self, transport: impl AuthTransport) -> AuthClient {
        let config = self.config;

        let initial = if config.auto_start {
            Some(StartOptions {
                initial_session: self.initial_session,
                verify_with_provider: self.verify_with_provider,
            })
        } else {
            if self.initial_session.is_some() {
                tracing::warn!("initial session ignored because auto_start is off");
            }
            None
        };

        tracing::debug!(
            auto_start = config.auto_start,
            auto_refresh = config.auto_refresh,
            "auth client created"
        );
        let handle = spawn_interpreter(transport, config.interpreter_config(), initial);

        AuthClient { handle, config }
    }
}

impl Default for AuthClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One authentication client instance.
///
/// Each instance owns its own session store, refresh timer, and
/// interpreter. Instances never share state implicitly; hand a session
/// from one to another with [`export_session`](Self::export_session) and
/// [`start_encoded`](Self::start_encoded), or [`start`](Self::start) with
/// [`StartOptions::with_session`].
///
/// Dropping the client ends its interpreter.
pub struct AuthClient {
    handle: InterpreterHandle,
    config: AuthClientConfig,
}

impl AuthClient {
    /// Creates a client with default settings. It starts right away with
    /// no session.
    pub fn new(transport: impl AuthTransport) -> Self {
        Self::builder().build(transport)
    }

    /// Creates a new builder.
    pub fn builder() -> AuthClientBuilder {
        AuthClientBuilder::new()
    }

    // -- Commands ---------------------------------------------------------

    /// Signs in with email and password.
    ///
    /// # Errors
    /// - [`AuthError::InvalidCredentials`]: the provider rejected the pair
    /// - [`AuthError::InvalidInput`]: empty email or password
    /// - [`AuthError::AlreadySignedIn`]: sign out first
    /// - [`AuthError::NotStarted`]: the client was built with
    ///   `auto_start(false)` and not started yet
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Arc<Session>, AuthError> {
        self.handle.sign_in(Credentials::new(email, password)).await
    }

    /// Signs out: invalidates the refresh token with the provider, then
    /// clears the local session whatever the provider said.
    ///
    /// Succeeds when already signed out.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.handle.sign_out().await
    }

    /// Starts an idle client, optionally seeded with a session.
    pub async fn start(&self, options: StartOptions) -> Result<(), AuthError> {
        self.handle.start(options).await
    }

    /// Starts an idle client seeded with a session encoded by
    /// [`export_session`](Self::export_session).
    pub async fn start_encoded(&self, bytes: &[u8]) -> Result<(), TokenwardError> {
        let options = StartOptions::from_encoded(bytes)?;
        self.handle.start(options).await?;
        Ok(())
    }

    /// Refreshes the access token now.
    pub async fn refresh_session(&self) -> Result<Arc<Session>, AuthError> {
        self.handle.refresh().await
    }

    /// Freezes the client. See [`InterpreterHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    // -- Queries ----------------------------------------------------------

    /// The current session.
    pub fn get_session(&self) -> Option<Arc<Session>> {
        self.handle.session()
    }

    /// The current access token.
    pub fn get_access_token(&self) -> Option<String> {
        self.handle.session().map(|s| s.access_token.clone())
    }

    /// The signed-in user.
    pub fn get_user(&self) -> Option<User> {
        self.handle.user()
    }

    /// Whether the client is signed in right now.
    ///
    /// When this returns `true`, [`get_access_token`](Self::get_access_token)
    /// returns a token. While a sign-out is in flight this already returns
    /// `false`.
    pub fn is_authenticated(&self) -> bool {
        self.handle.state().matches(SessionState::SignedIn) && self.handle.session().is_some()
    }

    /// Waits for any step in flight (start-up, sign-in) to finish, then
    /// answers [`is_authenticated`](Self::is_authenticated).
    ///
    /// A client built with `auto_start(false)` that is still idle answers
    /// `false` right away instead of waiting for a `start` that may never
    /// come.
    pub async fn is_authenticated_async(&self) -> bool {
        if !self.config.auto_start && self.state().matches(SessionState::Idle) {
            return false;
        }
        if let Err(e) = self.handle.await_state(AuthState::is_settled).await {
            tracing::debug!(error = %e, "client stopped before settling");
        }
        self.is_authenticated()
    }

    /// Encodes the current session for another instance.
    ///
    /// # Errors
    /// - [`AuthError::NotSignedIn`] if there is no session
    /// - [`CodecError::Encode`](tokenward_session::CodecError::Encode) if
    ///   encoding fails
    pub fn export_session(&self) -> Result<Vec<u8>, TokenwardError> {
        let session = self.handle.session().ok_or(AuthError::NotSignedIn)?;
        Ok(JsonCodec.encode(&*session)?)
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.handle.state()
    }

    /// Waits until `predicate` holds for the client state. Every
    /// transition is checked, including transient ones.
    pub async fn await_state<F>(&self, predicate: F) -> Result<AuthState, AuthError>
    where
        F: FnMut(&AuthState) -> bool + Send + 'static,
    {
        self.handle.await_state(predicate).await
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.handle.subscribe()
    }

    /// The settings this client was built with.
    pub fn config(&self) -> &AuthClientConfig {
        &self.config
    }
}
