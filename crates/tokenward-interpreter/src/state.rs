//! Interpreter state machine and the snapshot published to observers.

use serde::{Deserialize, Serialize};
use tokenward_session::AuthError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The steady lifecycle state of one client instance.
///
/// ```text
///            start                      sign_in ok / seed valid
///   Idle ──────────→ Starting ─────────────────────────────→ SignedIn ──┐
///                     ↑   │                                   │   ↑    │ refresh ok
///                     │   │ no seed / sign_in failed          │   └────┘
///                     │   ▼                                   │
///                   SignedOut ←─── Starting ←─────────────────┘
///                              sign_out / refresh failed
/// ```
///
/// - **Idle**: constructed, not started yet.
/// - **Starting**: an asynchronous step decides where to go next. Always
///   carries the `Loading` tag.
/// - **SignedIn**: a session is stored and the refresh timer is armed.
/// - **SignedOut**: no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Starting,
    SignedIn,
    SignedOut,
}

impl SessionState {
    /// Returns `true` if moving to `target` is an edge of the state machine.
    ///
    /// `SignedIn → SignedIn` is the token replacement done by a refresh.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Starting)
                | (Self::Starting, Self::SignedIn)
                | (Self::Starting, Self::SignedOut)
                | (Self::SignedOut, Self::Starting)
                | (Self::SignedIn, Self::Starting)
                | (Self::SignedIn, Self::SignedIn)
        )
    }

    /// Returns `true` for the states commands settle in.
    pub fn is_steady(self) -> bool {
        matches!(self, Self::SignedIn | Self::SignedOut)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::SignedIn => write!(f, "signed-in"),
            Self::SignedOut => write!(f, "signed-out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A transient label on the current state, orthogonal to the state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateTag {
    /// An asynchronous step (start-up check, network exchange) is in flight.
    Loading,
}

// ---------------------------------------------------------------------------
// AuthState
// ---------------------------------------------------------------------------

/// The snapshot published on every transition.
///
/// Observers receive this through [`InterpreterHandle::state`] or wait for
/// a condition with [`InterpreterHandle::await_state`].
///
/// [`InterpreterHandle::state`]: crate::InterpreterHandle::state
/// [`InterpreterHandle::await_state`]: crate::InterpreterHandle::await_state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub value: SessionState,
    loading: bool,
    /// Error of the most recent step that failed, cleared by the next step
    /// that succeeds. A forced sign-out leaves its cause here.
    pub last_error: Option<AuthError>,
}

impl AuthState {
    pub(crate) fn idle() -> Self {
        Self {
            value: SessionState::Idle,
            loading: false,
            last_error: None,
        }
    }

    pub(crate) fn set(&mut self, value: SessionState, loading: bool) {
        if !self.value.can_transition_to(value) {
            tracing::warn!(from = %self.value, to = %value, "unexpected state transition");
        }
        self.value = value;
        self.loading = loading;
    }

    /// Returns `true` if `tag` is currently set.
    pub fn has_tag(&self, tag: StateTag) -> bool {
        match tag {
            StateTag::Loading => self.loading,
        }
    }

    /// Returns `true` if the state is `value`.
    pub fn matches(&self, value: SessionState) -> bool {
        self.value == value
    }

    /// Started and not in the middle of a step.
    pub fn is_settled(&self) -> bool {
        !self.loading && self.value != SessionState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_transition_to_allows_lifecycle_edges() {
        use SessionState::*;
        assert!(Idle.can_transition_to(Starting));
        assert!(Starting.can_transition_to(SignedIn));
        assert!(Starting.can_transition_to(SignedOut));
        assert!(SignedOut.can_transition_to(Starting));
        assert!(SignedIn.can_transition_to(Starting));
        assert!(SignedIn.can_transition_to(SignedIn));
    }

    #[test]
    fn test_can_transition_to_rejects_shortcuts() {
        use SessionState::*;
        assert!(!Idle.can_transition_to(SignedIn));
        assert!(!SignedOut.can_transition_to(SignedIn));
        assert!(!SignedIn.can_transition_to(SignedOut));
        assert!(!Starting.can_transition_to(Idle));
    }

    #[test]
    fn test_is_steady() {
        assert!(SessionState::SignedIn.is_steady());
        assert!(SessionState::SignedOut.is_steady());
        assert!(!SessionState::Idle.is_steady());
        assert!(!SessionState::Starting.is_steady());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::SignedIn.to_string(), "signed-in");
        assert_eq!(SessionState::SignedOut.to_string(), "signed-out");
    }

    #[test]
    fn test_idle_state_is_not_settled() {
        let state = AuthState::idle();
        assert!(!state.has_tag(StateTag::Loading));
        assert!(!state.is_settled());
        assert!(state.matches(SessionState::Idle));
    }

    #[test]
    fn test_set_updates_value_and_loading_tag() {
        let mut state = AuthState::idle();

        state.set(SessionState::Starting, true);
        assert!(state.has_tag(StateTag::Loading));
        assert!(!state.is_settled());

        state.set(SessionState::SignedOut, false);
        assert!(!state.has_tag(StateTag::Loading));
        assert!(state.is_settled());
    }
}
