//! State publication with per-transition waiters.
//!
//! Every transition the actor makes is checked against the pending
//! `await_state` predicates while the new state is being published, so a
//! waiter sees transient states (`Starting` with `Loading`) even when the
//! step that follows them completes without yielding.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{AuthState, SessionState};

type Predicate = Box<dyn FnMut(&AuthState) -> bool + Send>;

struct Waiter {
    predicate: Predicate,
    reply: oneshot::Sender<AuthState>,
}

struct Inner {
    current: AuthState,
    waiters: Vec<Waiter>,
    closed: bool,
}

/// Outcome of registering a waiter.
pub(crate) enum Registration {
    /// The predicate already holds for the current state.
    Ready(AuthState),
    /// Resolved by the first later transition the predicate holds for.
    /// The sender is dropped if the interpreter exits first.
    Pending(oneshot::Receiver<AuthState>),
    /// The interpreter exited and the predicate does not hold for the
    /// state it froze in.
    Closed,
}

/// The published state, shared by the actor (writer) and its handle.
pub(crate) struct StatePublisher {
    inner: Mutex<Inner>,
}

impl StatePublisher {
    pub(crate) fn new(initial: AuthState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                waiters: Vec::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn current(&self) -> AuthState {
        self.lock().current.clone()
    }

    pub(crate) fn value(&self) -> SessionState {
        self.lock().current.value
    }

    /// Applies one transition and resolves every waiter whose predicate
    /// holds for the result. Waiters whose caller went away are dropped.
    pub(crate) fn publish(&self, transition: impl FnOnce(&mut AuthState)) {
        let mut inner = self.lock();
        transition(&mut inner.current);

        let Inner {
            current, waiters, ..
        } = &mut *inner;
        let before = waiters.len();
        let mut kept = Vec::with_capacity(before);
        for mut waiter in waiters.drain(..) {
            if waiter.reply.is_closed() {
                continue;
            }
            if (waiter.predicate)(current) {
                let _ = waiter.reply.send(current.clone());
            } else {
                kept.push(waiter);
            }
        }
        *waiters = kept;

        let resolved = before - waiters.len();
        if resolved > 0 {
            tracing::trace!(state = %current.value, resolved, "state waiters resolved");
        }
    }

    /// Checks `predicate` against the current state and, if it does not
    /// hold, queues it for later transitions.
    pub(crate) fn register(&self, mut predicate: Predicate) -> Registration {
        let mut inner = self.lock();
        if predicate(&inner.current) {
            return Registration::Ready(inner.current.clone());
        }
        if inner.closed {
            return Registration::Closed;
        }
        let (reply, rx) = oneshot::channel();
        inner.waiters.push(Waiter { predicate, reply });
        Registration::Pending(rx)
    }

    /// Marks the interpreter as exited. Pending waiters are dropped and
    /// later registrations only see the frozen state.
    pub(crate) fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.waiters.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
