//! In-process identity provider.
//!
//! Behaves like a real provider from the client's point of view: it checks
//! credentials against seeded user records, issues random opaque tokens,
//! rotates refresh tokens on every refresh, and forgets them on
//! invalidation. It also lets tests break it on purpose (unreachable
//! provider, revoked tokens, slow responses).
//!
//! Passwords are compared as given. Password hashing belongs to the real
//! provider's user administration, not to the session client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rand::Rng;
use tokenward_session::{AuthError, Session, User};

use crate::AuthTransport;

/// Default access token lifetime, matching common provider defaults.
const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

struct UserRecord {
    password: String,
    user: User,
}

#[derive(Default)]
struct ProviderState {
    /// User records keyed by lower-cased email.
    users: HashMap<String, UserRecord>,
    /// Live refresh tokens, mapped to the lower-cased email they belong to.
    refresh_tokens: HashMap<String, String>,
}

/// An identity provider that lives in process memory.
///
/// Share one instance between clients with an `Arc`; [`AuthTransport`]
/// is implemented for `Arc<T>`.
pub struct MemoryProvider {
    state: Mutex<ProviderState>,
    access_token_ttl: Duration,
    latency: Option<Duration>,
    unreachable: AtomicBool,
    exchanges: AtomicU64,
    refreshes: AtomicU64,
    invalidations: AtomicU64,
}

impl MemoryProvider {
    /// Creates a provider with no users and a 15 minute access token TTL.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProviderState::default()),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            latency: None,
            unreachable: AtomicBool::new(false),
            exchanges: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Sets the lifetime of issued access tokens.
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Delays every call by `latency` (Tokio time, so paused-clock tests
    /// stay instant).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seeds a user record, replacing any record with the same email.
    ///
    /// Emails are case-insensitive. Returns the identity the provider will
    /// attach to sessions for this user.
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let key = email.to_lowercase();
        let mut state = self.lock();
        if let Some(existing) = state.users.get_mut(&key) {
            existing.password = password.to_string();
            return existing.user.clone();
        }

        let user = User {
            id: generate_token(),
            email: key.clone(),
            locale: "en".into(),
            email_verified: true,
        };
        state.users.insert(
            key,
            UserRecord {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        tracing::debug!(user_id = %user.id, email = %user.email, "provider user seeded");
        user
    }

    /// Simulates an outage: every call fails with [`AuthError::Transport`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Revokes every refresh token issued to `email`, as an administrator
    /// or a sign-out elsewhere would. Returns how many were revoked.
    pub fn revoke_all(&self, email: &str) -> usize {
        let key = email.to_lowercase();
        let mut state = self.lock();
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, owner| *owner != key);
        before - state.refresh_tokens.len()
    }

    /// Returns `true` if the provider would still accept `refresh_token`.
    pub fn is_refresh_token_live(&self, refresh_token: &str) -> bool {
        self.lock().refresh_tokens.contains_key(refresh_token)
    }

    /// Number of credential exchanges attempted.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Number of refreshes attempted.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Number of invalidations attempted.
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> Result<(), AuthError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("identity provider unreachable".into()));
        }
        Ok(())
    }

    /// Issues a new session for `user` and registers its refresh token.
    fn issue(&self, state: &mut ProviderState, user: User) -> Session {
        let refresh_token = generate_token();
        state
            .refresh_tokens
            .insert(refresh_token.clone(), user.email.clone());

        let ttl = TimeDelta::from_std(self.access_token_ttl)
            .unwrap_or_else(|_| TimeDelta::days(365));
        Session {
            access_token: generate_token(),
            access_token_expires_at: Utc::now() + ttl,
            refresh_token,
            user,
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthTransport for MemoryProvider {
    async fn exchange_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.lock();
        let user = match state.users.get(&email.to_lowercase()) {
            Some(record) if record.password == password => record.user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(self.issue(&mut state, user))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.lock();
        // Rotation: the presented token is consumed whether or not the
        // user record still exists.
        let owner = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AuthError::TokenRevoked)?;
        let user = state
            .users
            .get(&owner)
            .map(|record| record.user.clone())
            .ok_or(AuthError::TokenRevoked)?;
        Ok(self.issue(&mut state, user))
    }

    async fn invalidate(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        match self.lock().refresh_tokens.remove(refresh_token) {
            Some(_) => Ok(()),
            None => Err(AuthError::AlreadySignedOut),
        }
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
