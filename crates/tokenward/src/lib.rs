//! # Tokenward
//!
//! Client-side authentication session manager.
//!
//! Tokenward obtains a session from an identity provider, keeps it fresh
//! in the background, hands it to other client instances on request, and
//! tears it down on sign-out. Applications implement (or pick) an
//! [`AuthTransport`] for their provider and talk to an [`AuthClient`].
//!
//! ## Quick Start
//!
//! ```rust
//! use tokenward::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), TokenwardError> {
//! let provider = std::sync::Arc::new(MemoryProvider::new());
//! provider.add_user("alice@example.com", "password123");
//!
//! // A long-lived client signs in...
//! let browser = AuthClient::new(provider.clone());
//! browser.sign_in("alice@example.com", "password123").await?;
//!
//! // ...and a short-lived one is seeded with its session.
//! let server = AuthClient::builder().auto_start(false).build(provider);
//! server.start_encoded(&browser.export_session()?).await?;
//! assert_eq!(server.get_access_token(), browser.get_access_token());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{AuthClient, AuthClientBuilder, AuthClientConfig};
pub use error::TokenwardError;

pub use tokenward_interpreter::{AuthEvent, AuthState, SessionState, StartOptions, StateTag};
pub use tokenward_refresh::RefreshConfig;
pub use tokenward_session::{AuthError, Codec, CodecError, JsonCodec, Session, User};
#[cfg(feature = "memory")]
pub use tokenward_transport::MemoryProvider;
pub use tokenward_transport::AuthTransport;

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::{
        AuthClient, AuthClientBuilder, AuthClientConfig, AuthError, AuthEvent, AuthState,
        AuthTransport, Session, SessionState, StartOptions, StateTag, TokenwardError, User,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryProvider;
}
