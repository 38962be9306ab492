//! Codec trait and implementations for handing sessions between instances.
//!
//! A session is the only state one client instance can pass to another.
//! The typical case is a server-rendered request: the browser-side client
//! signed in, the session travels in a cookie, and a short-lived server-side
//! client is seeded with it. The codec turns the session into bytes for
//! that trip and back.

use serde::{Serialize, de::DeserializeOwned};

use crate::CodecError;

/// Encodes values to bytes and decodes them back.
///
/// Generic over the value so the same codec can carry a bare [`Session`]
/// or an application envelope that embeds one.
///
/// [`Session`]: crate::Session
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`CodecError::Decode`] if the bytes are malformed or don't
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use chrono::Utc;
/// use tokenward_session::{Codec, JsonCodec, Session, User};
///
/// let session = Session {
///     access_token: "access".into(),
///     access_token_expires_at: Utc::now(),
///     refresh_token: "refresh".into(),
///     user: User {
///         id: "u1".into(),
///         email: "alice@example.com".into(),
///         locale: "en".into(),
///         email_verified: true,
///     },
/// };
///
/// let bytes = JsonCodec.encode(&session).unwrap();
/// let decoded: Session = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(session, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}
