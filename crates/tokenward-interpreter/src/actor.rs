//! Interpreter actor: an isolated Tokio task that owns one session lifecycle.
//!
//! The actor is the only writer of the session store, the refresh
//! scheduler, and the published state. Callers talk to it through an
//! [`InterpreterHandle`], which sends commands over an mpsc channel and
//! waits for the reply on a oneshot channel.
//!
//! # Ordering
//!
//! Commands are queued and handled one at a time, in arrival order. A
//! second `sign_in` issued while the first is waiting on the provider
//! simply waits its turn; two exchanges never race.
//!
//! Within a step:
//! - entering `SignedIn`: store the session, then publish the state;
//! - leaving `SignedIn`: publish `Starting`, then clear the store.
//!
//! So whenever the published state is `SignedIn`, the store holds a session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokenward_refresh::{RefreshDue, RefreshScheduler};
use tokenward_session::{AuthError, Session, SessionStore, User};
use tokenward_transport::AuthTransport;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};

use crate::publisher::{Registration, StatePublisher};
use crate::{AuthEvent, AuthState, Credentials, InterpreterConfig, SessionState, StartOptions};

type Reply<T> = oneshot::Sender<Result<T, AuthError>>;

/// Commands sent to the interpreter actor through its channel.
enum Command {
    Start {
        options: StartOptions,
        reply: Reply<()>,
    },
    SignIn {
        credentials: Credentials,
        reply: Reply<Arc<Session>>,
    },
    SignOut {
        reply: Reply<()>,
    },
    Refresh {
        reply: Reply<Arc<Session>>,
    },
}

/// Stop flag shared by the handle and the actor.
#[derive(Default)]
struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running interpreter.
///
/// Dropping the handle closes the command channel and ends the actor.
pub struct InterpreterHandle {
    commands: mpsc::Sender<Command>,
    state: Arc<StatePublisher>,
    events: broadcast::Sender<AuthEvent>,
    store: Arc<SessionStore>,
    stop: Arc<StopSignal>,
}

impl InterpreterHandle {
    /// Leaves `Idle`, optionally seeded with a session.
    ///
    /// # Errors
    /// - [`AuthError::AlreadyStarted`] if the interpreter left `Idle` before
    /// - [`AuthError::InvalidSession`] / [`AuthError::TokenExpired`] /
    ///   provider errors if the seed was rejected (state ends `SignedOut`)
    pub async fn start(&self, options: StartOptions) -> Result<(), AuthError> {
        self.request(|reply| Command::Start { options, reply }).await
    }

    /// Exchanges credentials for a session.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Arc<Session>, AuthError> {
        self.request(|reply| Command::SignIn { credentials, reply })
            .await
    }

    /// Ends the session. Succeeds when already signed out.
    ///
    /// The local session is cleared even if the interpreter is stopped
    /// while the provider call is in flight; the caller then gets
    /// [`AuthError::Stopped`] because the provider's answer is discarded.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.request(|reply| Command::SignOut { reply }).await
    }

    /// Refreshes the session now instead of waiting for the timer.
    pub async fn refresh(&self) -> Result<Arc<Session>, AuthError> {
        self.request(|reply| Command::Refresh { reply }).await
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state.current()
    }

    /// Waits until `predicate` holds for the published state and returns
    /// that state. Resolves immediately if it already holds.
    ///
    /// The predicate is checked against every transition as it is
    /// published, so transient states such as `Starting` with the
    /// `Loading` tag are seen even when the step finishes without yielding.
    ///
    /// # Errors
    /// Returns [`AuthError::Stopped`] if the interpreter exits before the
    /// predicate holds.
    pub async fn await_state<F>(&self, predicate: F) -> Result<AuthState, AuthError>
    where
        F: FnMut(&AuthState) -> bool + Send + 'static,
    {
        match self.state.register(Box::new(predicate)) {
            Registration::Ready(state) => Ok(state),
            Registration::Pending(rx) => rx.await.map_err(|_| AuthError::Stopped),
            Registration::Closed => Err(AuthError::Stopped),
        }
    }

    /// Subscribes to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// The current session, read synchronously from the store.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.store.get()
    }

    /// The current user, read synchronously from the store.
    pub fn user(&self) -> Option<User> {
        self.store.user()
    }

    /// Freezes the interpreter: the refresh timer is cancelled and results
    /// of in-flight provider calls are discarded. The only transition still
    /// made is the local half of a sign-out already in flight. Safe to call
    /// multiple times.
    pub fn stop(&self) {
        if !self.stop.stopped.swap(true, Ordering::SeqCst) {
            tracing::info!("interpreter stop requested");
            self.stop.notify.notify_one();
        }
    }

    /// Whether [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, AuthError> {
        if self.stop.is_stopped() {
            return Err(AuthError::Stopped);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| AuthError::Stopped)?;
        reply_rx.await.map_err(|_| AuthError::Stopped)?
    }
}

/// Spawns an interpreter task and returns its handle.
///
/// With `initial = Some(options)` the interpreter starts right away, as if
/// [`InterpreterHandle::start`] had been the first command; otherwise it
/// stays `Idle` until started.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_interpreter<T: AuthTransport>(
    transport: T,
    config: InterpreterConfig,
    initial: Option<StartOptions>,
) -> InterpreterHandle {
    let config = config.validated();
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let state = Arc::new(StatePublisher::new(AuthState::idle()));
    let (events_tx, _) = broadcast::channel(config.event_buffer);
    let store = Arc::new(SessionStore::new());
    let stop = Arc::new(StopSignal::default());

    let actor = Interpreter {
        transport,
        store: Arc::clone(&store),
        scheduler: RefreshScheduler::new(config.refresh),
        state: Arc::clone(&state),
        events: events_tx.clone(),
        commands: cmd_rx,
        stop: Arc::clone(&stop),
    };
    tokio::spawn(actor.run(initial));

    InterpreterHandle {
        commands: cmd_tx,
        state,
        events: events_tx,
        store,
        stop,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Interpreter<T: AuthTransport> {
    transport: T,
    store: Arc<SessionStore>,
    scheduler: RefreshScheduler,
    state: Arc<StatePublisher>,
    events: broadcast::Sender<AuthEvent>,
    commands: mpsc::Receiver<Command>,
    stop: Arc<StopSignal>,
}

impl<T: AuthTransport> Interpreter<T> {
    /// Runs the actor loop until stopped or every handle is gone.
    async fn run(mut self, initial: Option<StartOptions>) {
        tracing::debug!("interpreter started");

        if let Some(options) = initial {
            if let Err(e) = self.start(options).await {
                tracing::debug!(error = %e, "initial start did not sign in");
            }
        }

        while !self.stop.is_stopped() {
            tokio::select! {
                biased;

                _ = self.stop.notify.notified() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },

                due = self.scheduler.wait_for_refresh() => {
                    self.handle_refresh_due(due).await;
                }
            }
        }

        self.scheduler.disarm();
        self.state.close();
        tracing::info!(state = %self.value(), "interpreter stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start { options, reply } => {
                let result = self.start(options).await;
                let _ = reply.send(result);
            }
            Command::SignIn { credentials, reply } => {
                let result = self.sign_in(credentials).await;
                let _ = reply.send(result);
            }
            Command::SignOut { reply } => {
                let result = self.sign_out().await;
                let _ = reply.send(result);
            }
            Command::Refresh { reply } => {
                let result = self.refresh().await;
                let _ = reply.send(result);
            }
        }
    }

    // -- Commands ---------------------------------------------------------

    async fn start(&mut self, options: StartOptions) -> Result<(), AuthError> {
        if self.value() != SessionState::Idle {
            return Err(AuthError::AlreadyStarted);
        }
        self.enter_loading(SessionState::Starting);

        let Some(seed) = options.initial_session else {
            tracing::info!("started without a session");
            self.settle(SessionState::SignedOut, None);
            return Ok(());
        };

        if let Err(e) = seed.validate() {
            tracing::warn!(error = %e, "seeded session rejected");
            self.settle(SessionState::SignedOut, Some(e.clone()));
            return Err(e);
        }

        let expired = seed.is_expired_at(Utc::now());
        if !expired && !options.verify_with_provider {
            tracing::info!(user_id = %seed.user.id, "started from seeded session");
            self.establish(seed, None);
            return Ok(());
        }

        if expired && !options.verify_with_provider && !self.scheduler.config().enabled {
            tracing::info!(user_id = %seed.user.id, "seeded session expired, refresh disabled");
            self.settle(SessionState::SignedOut, Some(AuthError::TokenExpired));
            return Err(AuthError::TokenExpired);
        }

        let result = self.transport.refresh(&seed.refresh_token).await;
        if self.stop.is_stopped() {
            return Err(AuthError::Stopped);
        }

        match result {
            Ok(fresh) => {
                tracing::info!(user_id = %fresh.user.id, "started from refreshed seed");
                self.establish_checked(fresh, None).map(|_| ())
            }
            // The provider is unreachable but the seed still works locally.
            Err(e) if !expired && !e.forces_sign_out() => {
                tracing::warn!(
                    user_id = %seed.user.id,
                    error = %e,
                    "could not verify seeded session, keeping it"
                );
                self.establish(seed, Some(e));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "seeded session rejected by provider");
                self.settle(SessionState::SignedOut, Some(e.clone()));
                Err(e)
            }
        }
    }

    async fn sign_in(&mut self, credentials: Credentials) -> Result<Arc<Session>, AuthError> {
        match self.value() {
            SessionState::Idle => return Err(AuthError::NotStarted),
            SessionState::SignedIn => return Err(AuthError::AlreadySignedIn),
            _ => {}
        }
        credentials.validate()?;

        self.enter_loading(SessionState::Starting);
        let result = self
            .transport
            .exchange_credentials(&credentials.email, &credentials.password)
            .await;
        if self.stop.is_stopped() {
            return Err(AuthError::Stopped);
        }

        match result {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, email = %session.user.email, "signed in");
                self.establish_checked(session, None)
            }
            Err(e) => {
                tracing::info!(email = %credentials.email, error = %e, "sign-in failed");
                self.settle(SessionState::SignedOut, Some(e.clone()));
                Err(e)
            }
        }
    }

    async fn sign_out(&mut self) -> Result<(), AuthError> {
        if self.value() != SessionState::SignedIn {
            tracing::debug!(state = %self.value(), "sign-out with no session, nothing to do");
            return Ok(());
        }

        self.enter_loading(SessionState::Starting);

        let mut remote_error = None;
        if let Some(session) = self.store.get() {
            let result = self.transport.invalidate(&session.refresh_token).await;
            if self.stop.is_stopped() {
                // The provider's answer is discarded, the local session is not kept.
                self.tear_down(false, None);
                return Err(AuthError::Stopped);
            }
            match result {
                Ok(()) | Err(AuthError::AlreadySignedOut) => {}
                Err(e) => {
                    tracing::warn!(
                        user_id = %session.user.id,
                        error = %e,
                        "remote sign-out failed, clearing local session anyway"
                    );
                    self.emit(AuthEvent::RemoteSignOutFailed { error: e.clone() });
                    remote_error = Some(e);
                }
            }
        }

        self.tear_down(false, remote_error);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<Arc<Session>, AuthError> {
        if self.value() != SessionState::SignedIn {
            return Err(AuthError::NotSignedIn);
        }
        let Some(current) = self.store.get() else {
            return Err(AuthError::NotSignedIn);
        };

        self.enter_loading(SessionState::SignedIn);
        let result = self.transport.refresh(&current.refresh_token).await;
        if self.stop.is_stopped() {
            return Err(AuthError::Stopped);
        }

        let result = result.and_then(|fresh| {
            if fresh.user.id == current.user.id {
                Ok(fresh)
            } else {
                Err(AuthError::InvalidSession("refresh returned a different user".into()))
            }
        });

        match result {
            Ok(fresh) => {
                let expires_at = fresh.access_token_expires_at;
                match self.replace(fresh) {
                    Ok(session) => {
                        tracing::debug!(user_id = %session.user.id, %expires_at, "token refreshed");
                        self.emit(AuthEvent::TokenRefreshed { expires_at });
                        Ok(session)
                    }
                    Err(e) => Err(self.force_sign_out(e)),
                }
            }
            Err(e) if e.forces_sign_out() || matches!(e, AuthError::InvalidSession(_)) => {
                Err(self.force_sign_out(e))
            }
            Err(e) => {
                // Transient: keep the session and try again after `min_delay`.
                tracing::warn!(user_id = %current.user.id, error = %e, "token refresh failed, will retry");
                self.scheduler.arm(current.access_token_expires_at);
                self.settle(SessionState::SignedIn, Some(e.clone()));
                self.emit(AuthEvent::RefreshFailed { error: e.clone() });
                Err(e)
            }
        }
    }

    async fn handle_refresh_due(&mut self, due: RefreshDue) {
        if self.value() != SessionState::SignedIn {
            return;
        }
        tracing::debug!(sequence = due.sequence, expires_at = %due.expires_at, "scheduled refresh");
        if let Err(e) = self.refresh().await {
            tracing::debug!(error = %e, "scheduled refresh did not succeed");
        }
    }

    // -- Transitions ------------------------------------------------------

    /// Stores a session after checking it is complete. An incomplete
    /// session from the provider is treated like a failed exchange.
    fn establish_checked(
        &mut self,
        session: Session,
        last_error: Option<AuthError>,
    ) -> Result<Arc<Session>, AuthError> {
        if let Err(e) = session.validate() {
            tracing::warn!(error = %e, "provider returned an incomplete session");
            self.settle(SessionState::SignedOut, Some(e.clone()));
            return Err(e);
        }
        Ok(self.establish(session, last_error))
    }

    /// Enters `SignedIn` with `session`.
    fn establish(&mut self, session: Session, last_error: Option<AuthError>) -> Arc<Session> {
        let expires_at = session.access_token_expires_at;
        let session = self.store.set(session);
        self.scheduler.arm(expires_at);
        self.settle(SessionState::SignedIn, last_error);
        self.emit(AuthEvent::SignedIn {
            user: session.user.clone(),
        });
        session
    }

    /// Swaps in a refreshed session while staying `SignedIn`.
    fn replace(&mut self, session: Session) -> Result<Arc<Session>, AuthError> {
        session.validate()?;
        let expires_at = session.access_token_expires_at;
        let session = self.store.set(session);
        self.scheduler.arm(expires_at);
        self.settle(SessionState::SignedIn, None);
        Ok(session)
    }

    /// Ends the session because it can no longer be renewed. The provider
    /// already rejected the credential, so it is not asked to invalidate it.
    fn force_sign_out(&mut self, error: AuthError) -> AuthError {
        tracing::warn!(error = %error, "session can't be refreshed, signing out");
        self.emit(AuthEvent::RefreshFailed {
            error: error.clone(),
        });
        self.enter_loading(SessionState::Starting);
        self.tear_down(true, Some(error.clone()));
        error
    }

    /// Leaves the session: publish `SignedOut` only after the store is empty.
    fn tear_down(&mut self, forced: bool, last_error: Option<AuthError>) {
        let previous = self.store.clear();
        self.scheduler.disarm();
        self.settle(SessionState::SignedOut, last_error);
        if let Some(session) = previous {
            tracing::info!(user_id = %session.user.id, forced, "signed out");
        }
        self.emit(AuthEvent::SignedOut { forced });
    }

    fn value(&self) -> SessionState {
        self.state.value()
    }

    fn enter_loading(&self, value: SessionState) {
        self.state.publish(|state| state.set(value, true));
    }

    fn settle(&self, value: SessionState, last_error: Option<AuthError>) {
        self.state.publish(|state| {
            state.set(value, false);
            state.last_error = last_error;
        });
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
