//! Hands a session from a long-lived "browser" client to a short-lived
//! "server" client, the way a server-rendered request reuses the session
//! the browser already holds.
//!
//! Run with `RUST_LOG=info cargo run -p cross-instance` to see the
//! lifecycle logs.

use std::sync::Arc;

use tokenward::prelude::*;
use tracing_subscriber::EnvFilter;

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "password123";

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

struct Outcome {
    server_was_authenticated: bool,
    server_token_after_sign_out: Option<String>,
    browser_refresh: Result<(), AuthError>,
}

async fn run(provider: Arc<MemoryProvider>) -> Result<Outcome, TokenwardError> {
    let browser = AuthClient::new(Arc::clone(&provider));
    let session = browser.sign_in(EMAIL, PASSWORD).await?;
    println!("browser signed in as {}", session.user.email);

    // The session travels as JSON, e.g. in a cookie.
    let cookie = browser.export_session()?;
    println!("cookie: {} bytes", cookie.len());

    let server = AuthClient::builder().auto_start(false).build(Arc::clone(&provider));
    server.start_encoded(&cookie).await?;
    let server_was_authenticated = server.is_authenticated_async().await;
    println!("server authenticated: {server_was_authenticated}");

    server.sign_out().await?;
    let server_token_after_sign_out = server.get_access_token();
    println!("server access token after sign-out: {server_token_after_sign_out:?}");

    // The server invalidated the shared refresh token, so the browser's
    // next refresh is rejected and it signs itself out.
    let browser_refresh = browser.refresh_session().await.map(|_| ());
    println!(
        "browser refresh: {:?}, browser state: {}",
        browser_refresh,
        browser.state().value
    );

    server.stop();
    browser.stop();

    Ok(Outcome {
        server_was_authenticated,
        server_token_after_sign_out,
        browser_refresh,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let provider = MemoryProvider::new();
    provider.add_user(EMAIL, PASSWORD);

    let outcome = run(Arc::new(provider)).await?;
    if !outcome.server_was_authenticated {
        return Err("seeded server client did not authenticate".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_hands_off_and_signs_out_everywhere() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_user(EMAIL, PASSWORD);

        let outcome = run(Arc::clone(&provider)).await.unwrap();

        assert!(outcome.server_was_authenticated);
        assert_eq!(outcome.server_token_after_sign_out, None);
        assert_eq!(outcome.browser_refresh, Err(AuthError::TokenRevoked));
        assert_eq!(provider.invalidation_count(), 1);
    }
}
