//! Identity-provider transport abstraction for Tokenward.
//!
//! Provides the [`AuthTransport`] trait: the three calls the session core
//! makes against a remote identity provider. The core never talks HTTP
//! itself; whatever sits behind this trait owns connection handling,
//! retries, and wire formats.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryProvider`], an in-process provider for
//!   tests, demos, and local development.

#![allow(async_fn_in_trait)]

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryProvider;

use std::future::Future;
use std::sync::Arc;

use tokenward_session::{AuthError, Session};

/// The identity-provider calls the session core depends on.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static`: the transport is moved into the interpreter
///   task and may be shared between several clients through an `Arc`.
/// - Every returned future is `Send` so the interpreter can run on a
///   multi-threaded runtime.
pub trait AuthTransport: Send + Sync + 'static {
    /// Exchanges an email/password pair for a fresh session.
    ///
    /// # Returns
    /// - `Ok(Session)`: the provider accepted the credentials
    /// - `Err(AuthError::InvalidCredentials)`: unknown user or wrong password
    /// - `Err(AuthError::Transport)`: the provider was unreachable
    fn exchange_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// Exchanges a refresh token for a new session of the same user.
    ///
    /// Providers that rotate refresh tokens invalidate `refresh_token`
    /// once this succeeds.
    ///
    /// # Returns
    /// - `Err(AuthError::TokenRevoked)` / `Err(AuthError::TokenExpired)`:
    ///   the refresh token can't be used any more
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// Invalidates a refresh token so no holder can renew the session.
    fn invalidate(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Lets several clients share one provider, e.g. a long-lived browser
/// client and a short-lived per-request client talking to the same backend.
impl<T: AuthTransport> AuthTransport for Arc<T> {
    fn exchange_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send {
        (**self).exchange_credentials(email, password)
    }

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send {
        (**self).refresh(refresh_token)
    }

    fn invalidate(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send {
        (**self).invalidate(refresh_token)
    }
}
