//! The session store: the current session of one client instance.
//!
//! # Concurrency note
//!
//! Writes come only from the interpreter task; reads come from any thread
//! through the auth client's synchronous accessors. A `std::sync::RwLock`
//! is enough because no lock is ever held across an `.await`. The session
//! sits behind an `Arc`, so a read clones a pointer, not the tokens.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{Session, User};

/// Holds the current [`Session`], or nothing.
///
/// Every update replaces the whole value under one write lock, so readers
/// see either the old session or the new one, never a mix.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current session, if any.
    pub fn get(&self) -> Option<Arc<Session>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current session.
    pub fn set(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&session));
        tracing::debug!(user_id = %session.user.id, "session stored");
        session
    }

    /// Removes the current session. Returns the one that was removed.
    pub fn clear(&self) -> Option<Arc<Session>> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = &previous {
            tracing::debug!(user_id = %session.user.id, "session cleared");
        }
        previous
    }

    /// The current access token, read from one snapshot.
    pub fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token.clone())
    }

    /// The current user, read from one snapshot.
    pub fn user(&self) -> Option<User> {
        self.get().map(|s| s.user.clone())
    }

    /// Returns `true` if a session is stored.
    pub fn is_present(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;

    fn session(token: &str) -> Session {
        Session {
            access_token: token.into(),
            access_token_expires_at: Utc::now() + TimeDelta::minutes(15),
            refresh_token: format!("refresh-{token}"),
            user: User {
                id: "user-1".into(),
                email: "alice@example.com".into(),
                locale: "en".into(),
                email_verified: true,
            },
        }
    }

    #[test]
    fn test_get_empty_store_returns_none() {
        let store = SessionStore::new();

        assert!(store.get().is_none());
        assert!(store.access_token().is_none());
        assert!(!store.is_present());
    }

    #[test]
    fn test_set_then_get_returns_session() {
        let store = SessionStore::new();

        store.set(session("a"));

        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(
            store.user().map(|u| u.email).as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_set_replaces_whole_session() {
        let store = SessionStore::new();
        store.set(session("a"));

        store.set(session("b"));

        let current = store.get().expect("session present");
        assert_eq!(current.access_token, "b");
        assert_eq!(current.refresh_token, "refresh-b");
    }

    #[test]
    fn test_clear_returns_previous_and_empties() {
        let store = SessionStore::new();
        store.set(session("a"));

        let previous = store.clear();

        assert_eq!(previous.map(|s| s.access_token.clone()).as_deref(), Some("a"));
        assert!(store.get().is_none());
        assert!(store.clear().is_none(), "second clear has nothing to remove");
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        // A reader holding an Arc keeps its snapshot even after the
        // store moves on.
        let store = SessionStore::new();
        store.set(session("a"));
        let held = store.get().expect("session present");

        store.set(session("b"));

        assert_eq!(held.access_token, "a");
        assert_eq!(store.access_token().as_deref(), Some("b"));
    }
}
