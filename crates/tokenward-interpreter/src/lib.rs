//! Session lifecycle interpreter for Tokenward.
//!
//! Each client instance runs one interpreter as an isolated Tokio task
//! (actor model). The interpreter owns the session store and the refresh
//! timer, and is the only code that moves the session between states.
//!
//! # Key types
//!
//! - [`spawn_interpreter`]: starts the actor, returns its handle
//! - [`InterpreterHandle`]: send commands, observe state, subscribe to events
//! - [`SessionState`] / [`AuthState`]: the state machine and its snapshot
//! - [`InterpreterConfig`], [`StartOptions`], [`Credentials`]: inputs
//! - [`AuthEvent`]: lifecycle notifications

mod actor;
mod config;
mod publisher;
mod state;

pub use actor::{InterpreterHandle, spawn_interpreter};
pub use config::{AuthEvent, Credentials, InterpreterConfig, StartOptions};
pub use state::{AuthState, SessionState, StateTag};
