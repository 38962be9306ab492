//! Session types: the data that represents a signed-in user.
//!
//! A session is the client's proof that a user signed in. It tracks:
//! - WHO the user is ([`User`])
//! - HOW to prove it to other services (the access token)
//! - UNTIL WHEN that proof holds (the expiry)
//! - HOW to get a new proof without asking for a password again
//!   (the refresh token)

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The identity record attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Provider-assigned user id.
    pub id: String,
    pub email: String,
    /// Preferred locale, e.g. `"en"`.
    pub locale: String,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A complete signed-in session.
///
/// A session is always handled as a whole: the store swaps entire values,
/// never individual fields, so a stale token can't be observed next to a
/// fresh identity.
///
/// The serialized form uses camelCase keys so it can be handed to (or
/// received from) other runtimes as plain JSON:
///
/// ```json
/// {
///   "accessToken": "…",
///   "accessTokenExpiresAt": "2026-01-01T00:15:00Z",
///   "refreshToken": "…",
///   "user": { "id": "…", "email": "alice@example.com", "locale": "en", "emailVerified": true }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer credential presented to other services.
    pub access_token: String,

    /// Absolute instant after which `access_token` is no longer accepted.
    pub access_token_expires_at: DateTime<Utc>,

    /// Opaque credential exchanged for a new session. Providers may
    /// rotate it on every use.
    pub refresh_token: String,

    pub user: User,
}

impl Session {
    /// Checks that the session is fully populated.
    ///
    /// Seeded sessions come from outside the process and can't be trusted
    /// to be complete.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidSession`] naming the first missing part.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::InvalidSession("access token is empty".into()));
        }
        if self.refresh_token.is_empty() {
            return Err(AuthError::InvalidSession("refresh token is empty".into()));
        }
        if self.user.id.is_empty() {
            return Err(AuthError::InvalidSession("user id is empty".into()));
        }
        Ok(())
    }

    /// Returns `true` once `now` has reached the access token's expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_token_expires_at
    }

    /// Remaining access token lifetime at `now`, zero when already expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        (self.access_token_expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
