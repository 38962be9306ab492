//! Session values and storage for Tokenward.
//!
//! This crate is the bottom of the stack. It knows what a signed-in
//! session looks like and where the current one lives, but nothing about
//! how sessions are obtained or when they change:
//!
//! 1. **Session values** ([`Session`], [`User`]): the bundle of tokens,
//!    expiry, and identity handed out by the identity provider.
//! 2. **Storage** ([`SessionStore`]): the single source of truth for the
//!    current session inside one client instance.
//! 3. **Hand-off** ([`Codec`], [`JsonCodec`]): turning a session into bytes
//!    so one instance can seed another.
//! 4. **Errors** ([`AuthError`], [`CodecError`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Auth Client (above)        ← facade over everything below
//!     ↕
//! Interpreter                ← decides WHEN the store changes
//!     ↕
//! Session Layer (this crate) ← holds WHAT the current session is
//! ```

mod codec;
mod error;
mod session;
mod store;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{AuthError, CodecError};
pub use session::{Session, User};
pub use store::SessionStore;
