//! Integration tests for the refresh scheduler.
//!
//! Timer tests run with `start_paused = true`: Tokio's clock only moves
//! when every task is idle, then jumps straight to the next deadline, so
//! `sleep_until` resolves instantly in wall-clock terms.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokenward_refresh::{RefreshConfig, RefreshMetrics, RefreshScheduler};

// =========================================================================
// Helpers
// =========================================================================

fn scheduler() -> RefreshScheduler {
    RefreshScheduler::new(RefreshConfig::default())
}

// =========================================================================
// RefreshConfig
// =========================================================================

#[test]
fn test_default_config_values() {
    let cfg = RefreshConfig::default();
    assert!(cfg.enabled);
    assert_eq!(cfg.lead, Duration::from_secs(60));
    assert_eq!(cfg.min_delay, Duration::from_secs(1));
}

#[test]
fn test_validated_clamps_min_delay_to_lead() {
    let cfg = RefreshConfig {
        lead: Duration::from_secs(5),
        min_delay: Duration::from_secs(30),
        ..RefreshConfig::default()
    }
    .validated();

    assert_eq!(cfg.min_delay, Duration::from_secs(5));
}

#[test]
fn test_delay_until_refresh_subtracts_lead() {
    let cfg = RefreshConfig::default();
    let now = Utc::now();

    let delay = cfg.delay_until_refresh(now + TimeDelta::minutes(15), now);

    assert_eq!(delay, Duration::from_secs(14 * 60));
}

#[test]
fn test_delay_until_refresh_inside_lead_uses_min_delay() {
    let cfg = RefreshConfig::default();
    let now = Utc::now();

    let delay = cfg.delay_until_refresh(now + TimeDelta::seconds(30), now);

    assert_eq!(delay, cfg.min_delay);
}

#[test]
fn test_delay_until_refresh_already_expired_uses_min_delay() {
    let cfg = RefreshConfig::default();
    let now = Utc::now();

    let delay = cfg.delay_until_refresh(now - TimeDelta::minutes(5), now);

    assert_eq!(delay, cfg.min_delay);
}

// =========================================================================
// Arm / disarm
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_new_scheduler_is_disarmed() {
    let s = scheduler();
    assert!(!s.is_armed());
    assert_eq!(s.armed_expiry(), None);
    assert_eq!(s.deadline(), None);
    assert_eq!(s.metrics(), &RefreshMetrics::default());
}

#[tokio::test(start_paused = true)]
async fn test_arm_sets_single_deadline() {
    let mut s = scheduler();
    let expires_at = Utc::now() + TimeDelta::minutes(10);

    let delay = s.arm(expires_at).expect("enabled scheduler arms");

    assert!(s.is_armed());
    assert_eq!(s.armed_expiry(), Some(expires_at));
    assert!(delay <= Duration::from_secs(9 * 60));
    assert_eq!(s.metrics().total_armed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_arm_twice_keeps_only_latest_deadline() {
    let mut s = scheduler();
    let first = Utc::now() + TimeDelta::minutes(10);
    let second = Utc::now() + TimeDelta::minutes(20);

    s.arm(first);
    s.arm(second);

    assert_eq!(s.armed_expiry(), Some(second));
    assert_eq!(s.metrics().total_armed, 2);
    assert_eq!(s.metrics().total_disarmed, 1, "first deadline was cancelled");

    // Exactly one firing, for the latest expiry.
    let due = s.wait_for_refresh().await;
    assert_eq!(due.expires_at, second);
    assert_eq!(due.sequence, 2);

    let again = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_refresh()).await;
    assert!(again.is_err(), "no second timer should be pending");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_cancels_pending_deadline() {
    let mut s = scheduler();
    s.arm(Utc::now() + TimeDelta::minutes(10));

    assert!(s.disarm());
    assert!(!s.is_armed());

    let result = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_refresh()).await;
    assert!(result.is_err(), "disarmed scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_idempotent() {
    let mut s = scheduler();
    s.arm(Utc::now() + TimeDelta::minutes(10));

    assert!(s.disarm());
    assert!(!s.disarm());
    assert_eq!(s.metrics().total_disarmed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_scheduler_never_arms() {
    let mut s = RefreshScheduler::new(RefreshConfig {
        enabled: false,
        ..RefreshConfig::default()
    });

    assert_eq!(s.arm(Utc::now() + TimeDelta::minutes(10)), None);
    assert!(!s.is_armed());
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_refresh_fires_after_delay() {
    let mut s = scheduler();
    let start = tokio::time::Instant::now();

    let delay = s.arm(Utc::now() + TimeDelta::minutes(2)).unwrap();
    let due = s.wait_for_refresh().await;

    assert!(start.elapsed() >= delay);
    assert_eq!(due.sequence, 1);
    assert!(!s.is_armed(), "deadline is one-shot");
    assert_eq!(s.metrics().total_fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_refresh_is_cancel_safe() {
    let mut s = scheduler();
    let expires_at = Utc::now() + TimeDelta::minutes(5);
    s.arm(expires_at);

    // Drop the wait early, as a losing select! branch would.
    let early = tokio::time::timeout(Duration::from_secs(1), s.wait_for_refresh()).await;
    assert!(early.is_err());
    assert!(s.is_armed(), "deadline survives a cancelled wait");

    let due = s.wait_for_refresh().await;
    assert_eq!(due.expires_at, expires_at);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_after_fire_schedules_again() {
    let mut s = scheduler();
    s.arm(Utc::now() + TimeDelta::minutes(2));
    s.wait_for_refresh().await;

    let next = Utc::now() + TimeDelta::minutes(4);
    s.arm(next);
    let due = s.wait_for_refresh().await;

    assert_eq!(due.expires_at, next);
    assert_eq!(due.sequence, 2);
    assert_eq!(s.metrics().total_fired, 2);
}
