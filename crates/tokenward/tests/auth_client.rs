//! Integration tests for the auth client facade.
//!
//! These drive whole client instances against a shared in-memory provider,
//! the way an application (or a browser client plus a server-side client)
//! would.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokenward::prelude::*;
use tokenward::CodecError;

// =========================================================================
// Helpers
// =========================================================================

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "password123";

fn provider() -> Arc<MemoryProvider> {
    let provider = MemoryProvider::new();
    provider.add_user(EMAIL, PASSWORD);
    Arc::new(provider)
}

/// A client built with `auto_start(false)`, ready to be seeded.
fn unstarted(provider: &Arc<MemoryProvider>) -> AuthClient {
    AuthClient::builder()
        .auto_start(false)
        .build(Arc::clone(provider))
}

// =========================================================================
// Without an initial session
// =========================================================================

#[tokio::test]
async fn test_sign_in_then_sign_out_without_initial_session() {
    let client = AuthClient::new(provider());

    let session = client.sign_in(EMAIL, PASSWORD).await.expect("sign in");

    assert_eq!(session.user.email, EMAIL);
    assert_eq!(client.get_session(), Some(Arc::clone(&session)));
    assert_eq!(client.get_access_token(), Some(session.access_token.clone()));
    assert!(client.is_authenticated());

    client.sign_out().await.expect("sign out");

    assert_eq!(client.get_session(), None);
    assert_eq!(client.get_access_token(), None);
    assert_eq!(client.get_user(), None);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_sign_in_wrong_password_returns_invalid_credentials() {
    let client = AuthClient::new(provider());

    let result = client.sign_in(EMAIL, "wrong").await;

    assert_eq!(result, Err(AuthError::InvalidCredentials));
    assert_eq!(client.state().value, SessionState::SignedOut);
    assert!(!client.is_authenticated());
    assert_eq!(client.get_access_token(), None);
}

#[tokio::test]
async fn test_sign_out_twice_returns_ok_both_times() {
    let client = AuthClient::new(provider());
    client.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(client.sign_out().await, Ok(()));
    assert_eq!(client.sign_out().await, Ok(()));
    assert_eq!(client.state().value, SessionState::SignedOut);
}

#[tokio::test]
async fn test_get_user_matches_signed_in_user() {
    let provider = provider();
    let client = AuthClient::new(Arc::clone(&provider));

    client.sign_in(EMAIL, PASSWORD).await.unwrap();

    let user = client.get_user().expect("user");
    assert_eq!(user.email, EMAIL);
    assert_eq!(user.locale, "en");
    assert!(user.email_verified);
}

#[tokio::test]
async fn test_sign_in_without_start_returns_not_started() {
    let client = unstarted(&provider());

    assert_eq!(
        client.sign_in(EMAIL, PASSWORD).await,
        Err(AuthError::NotStarted)
    );
    assert_eq!(client.state().value, SessionState::Idle);
}

// =========================================================================
// Cross-instance seeding
// =========================================================================

#[tokio::test]
async fn test_seeded_instance_signs_out_consistently() {
    let provider = provider();
    let a = AuthClient::new(Arc::clone(&provider));
    let a_session = a.sign_in(EMAIL, PASSWORD).await.unwrap();

    let b = unstarted(&provider);
    b.start(StartOptions::with_session((*a_session).clone()))
        .await
        .expect("seeded start");
    b.await_state(|s| !s.has_tag(StateTag::Loading))
        .await
        .unwrap();

    assert!(b.is_authenticated());
    assert_eq!(b.get_access_token(), Some(a_session.access_token.clone()));

    b.sign_out().await.expect("sign out");

    assert_eq!(b.get_session(), None);
    assert_eq!(b.get_access_token(), None);
    assert!(!b.is_authenticated());
    assert!(!provider.is_refresh_token_live(&a_session.refresh_token));
    // A is a separate instance and keeps its local copy.
    assert_eq!(a.get_session(), Some(a_session));
}

#[tokio::test]
async fn test_builder_initial_session_auto_starts_seeded() {
    let provider = provider();
    let a = AuthClient::new(Arc::clone(&provider));
    let a_session = a.sign_in(EMAIL, PASSWORD).await.unwrap();

    let b = AuthClient::builder()
        .initial_session((*a_session).clone())
        .build(Arc::clone(&provider));

    assert!(b.is_authenticated_async().await);
    assert_eq!(b.get_access_token(), Some(a_session.access_token.clone()));
}

#[tokio::test]
async fn test_verified_seed_is_replaced_by_refreshed_session() {
    let provider = provider();
    let a = AuthClient::new(Arc::clone(&provider));
    let a_session = a.sign_in(EMAIL, PASSWORD).await.unwrap();

    let b = AuthClient::builder()
        .initial_session((*a_session).clone())
        .verify_with_provider(true)
        .build(Arc::clone(&provider));

    assert!(b.is_authenticated_async().await);
    let b_token = b.get_access_token().expect("token");
    assert_ne!(b_token, a_session.access_token);
    assert_eq!(b.get_user(), Some(a_session.user.clone()));
    assert_eq!(provider.refresh_count(), 1);
}

#[tokio::test]
async fn test_export_then_start_encoded_hands_over_session() {
    let provider = provider();
    let a = AuthClient::new(Arc::clone(&provider));
    a.sign_in(EMAIL, PASSWORD).await.unwrap();

    let bytes = a.export_session().expect("export");
    let b = unstarted(&provider);
    b.start_encoded(&bytes).await.expect("start");

    assert!(b.is_authenticated());
    assert_eq!(b.get_session(), a.get_session());
}

#[tokio::test]
async fn test_export_session_camel_case_json() {
    let client = AuthClient::new(provider());
    client.sign_in(EMAIL, PASSWORD).await.unwrap();

    let bytes = client.export_session().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert!(json["accessToken"].is_string());
    assert!(json["accessTokenExpiresAt"].is_string());
    assert_eq!(json["user"]["emailVerified"], true);
}

#[tokio::test]
async fn test_export_session_when_signed_out_returns_not_signed_in() {
    let client = AuthClient::new(provider());
    client.await_state(AuthState::is_settled).await.unwrap();

    let err = client.export_session().unwrap_err();

    assert_eq!(err.as_auth(), Some(&AuthError::NotSignedIn));
}

#[tokio::test]
async fn test_start_encoded_garbage_returns_codec_error() {
    let client = unstarted(&provider());

    let err = client.start_encoded(b"not a session").await.unwrap_err();

    assert!(matches!(err, TokenwardError::Codec(CodecError::Decode(_))));
    assert_eq!(client.state().value, SessionState::Idle);
}

#[tokio::test]
async fn test_seed_with_expired_token_and_auto_refresh_off_is_rejected() {
    let provider = provider();
    let mut seed = provider.exchange_credentials(EMAIL, PASSWORD).await.unwrap();
    seed.access_token_expires_at = Utc::now() - TimeDelta::minutes(5);
    let client = AuthClient::builder()
        .auto_start(false)
        .auto_refresh(false)
        .build(Arc::clone(&provider));

    let result = client.start(StartOptions::with_session(seed)).await;

    assert_eq!(result, Err(AuthError::TokenExpired));
    assert!(!client.is_authenticated());
}

// =========================================================================
// Refresh and events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_background_refresh_keeps_access_token_fresh() {
    let provider = provider();
    let client = AuthClient::builder()
        .refresh_lead(Duration::from_secs(120))
        .build(Arc::clone(&provider));
    let first = client.sign_in(EMAIL, PASSWORD).await.unwrap();
    let mut events = client.subscribe();

    let event = events.recv().await.unwrap();

    assert!(matches!(event, AuthEvent::TokenRefreshed { .. }));
    assert!(client.is_authenticated());
    assert_ne!(client.get_access_token(), Some(first.access_token.clone()));
}

#[tokio::test(start_paused = true)]
async fn test_revoked_refresh_token_forces_sign_out() {
    let provider = provider();
    let client = AuthClient::new(Arc::clone(&provider));
    client.sign_in(EMAIL, PASSWORD).await.unwrap();
    provider.revoke_all(EMAIL);

    let state = client
        .await_state(|s| s.matches(SessionState::SignedOut))
        .await
        .unwrap();

    assert_eq!(state.last_error, Some(AuthError::TokenRevoked));
    assert!(!client.is_authenticated());
    assert_eq!(client.get_access_token(), None);
    // Forced sign-out skips the provider call.
    assert_eq!(provider.invalidation_count(), 0);
}

#[tokio::test]
async fn test_refresh_session_returns_new_token() {
    let client = AuthClient::new(provider());
    let first = client.sign_in(EMAIL, PASSWORD).await.unwrap();

    let second = client.refresh_session().await.expect("refresh");

    assert_ne!(first.access_token, second.access_token);
    assert_eq!(client.get_access_token(), Some(second.access_token.clone()));
}

#[tokio::test]
async fn test_subscribe_sees_sign_in_and_sign_out() {
    let client = AuthClient::new(provider());
    client.await_state(AuthState::is_settled).await.unwrap();
    let mut events = client.subscribe();

    client.sign_in(EMAIL, PASSWORD).await.unwrap();
    client.sign_out().await.unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        AuthEvent::SignedIn { user } if user.email == EMAIL
    ));
    assert_eq!(
        events.recv().await.unwrap(),
        AuthEvent::SignedOut { forced: false }
    );
}

// =========================================================================
// Stop
// =========================================================================

#[tokio::test]
async fn test_stop_freezes_state() {
    let client = AuthClient::new(provider());
    client.sign_in(EMAIL, PASSWORD).await.unwrap();

    client.stop();

    assert_eq!(client.sign_out().await, Err(AuthError::Stopped));
    assert!(client.is_authenticated());
    assert_eq!(client.state().value, SessionState::SignedIn);
}

#[tokio::test]
async fn test_is_authenticated_async_waits_for_start() {
    let client = AuthClient::new(provider());

    assert!(!client.is_authenticated_async().await);
    assert_eq!(client.state().value, SessionState::SignedOut);
}

#[tokio::test]
async fn test_is_authenticated_async_unstarted_returns_false() {
    let client = unstarted(&provider());

    let answer = tokio::time::timeout(Duration::from_secs(5), client.is_authenticated_async())
        .await
        .expect("does not wait for a start that never comes");

    assert!(!answer);
    assert_eq!(client.state().value, SessionState::Idle);
}
