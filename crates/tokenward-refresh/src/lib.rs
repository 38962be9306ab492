//! Proactive access-token refresh scheduler for Tokenward.
//!
//! Keeps at most one pending deadline per client: "refresh the session a
//! little before its access token expires". Arming again replaces the
//! deadline; disarming drops it.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside the interpreter's
//! `tokio::select!` loop, next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         due = scheduler.wait_for_refresh() => {
//!             /* call the provider, then arm() again or sign out */
//!         }
//!     }
//! }
//! ```
//!
//! While disarmed, [`RefreshScheduler::wait_for_refresh`] pends forever,
//! so the branch simply never wins.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// When `false`, [`RefreshScheduler::arm`] is a no-op and sessions are
    /// only refreshed on demand.
    pub enabled: bool,
    /// How long before expiry the refresh should fire. Default: 60 s.
    pub lead: Duration,
    /// Lower bound on the delay between arming and firing. Default: 1 s.
    /// Keeps very short-lived tokens (or a failing provider) from turning
    /// the scheduler into a busy loop.
    pub min_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lead: Duration::from_secs(60),
            min_delay: Duration::from_secs(1),
        }
    }
}

impl RefreshConfig {
    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`RefreshScheduler::new`]. `min_delay` is
    /// capped to `lead` (when `lead` is non-zero).
    pub fn validated(mut self) -> Self {
        if !self.lead.is_zero() && self.min_delay > self.lead {
            warn!(
                min_delay_ms = self.min_delay.as_millis() as u64,
                lead_ms = self.lead.as_millis() as u64,
                "refresh min_delay exceeds lead, clamping"
            );
            self.min_delay = self.lead;
        }
        self
    }

    /// Delay from `now` until a token expiring at `expires_at` should be
    /// refreshed.
    pub fn delay_until_refresh(
        &self,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Duration {
        let until_expiry = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        until_expiry.saturating_sub(self.lead).max(self.min_delay)
    }
}

// ---------------------------------------------------------------------------
// Refresh due (returned to the caller when the deadline fires)
// ---------------------------------------------------------------------------

/// A fired refresh deadline, returned by
/// [`RefreshScheduler::wait_for_refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshDue {
    /// The access-token expiry the deadline was armed against.
    pub expires_at: DateTime<Utc>,
    /// Monotonically increasing arm counter (starts at 1). Lets callers
    /// tell which arming produced this firing.
    pub sequence: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime counters for the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshMetrics {
    /// Times a deadline was set.
    pub total_armed: u64,
    /// Times a pending deadline was cancelled.
    pub total_disarmed: u64,
    /// Times a deadline elapsed.
    pub total_fired: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Pending {
    deadline: TokioInstant,
    expires_at: DateTime<Utc>,
    sequence: u64,
}

/// One-shot refresh timer. One `RefreshScheduler` per interpreter.
pub struct RefreshScheduler {
    config: RefreshConfig,
    pending: Option<Pending>,
    sequence: u64,
    metrics: RefreshMetrics,
}

impl RefreshScheduler {
    /// Create a new, disarmed scheduler from config.
    pub fn new(config: RefreshConfig) -> Self {
        let config = config.validated();
        debug!(
            enabled = config.enabled,
            lead_ms = config.lead.as_millis() as u64,
            "refresh scheduler created"
        );
        Self {
            config,
            pending: None,
            sequence: 0,
            metrics: RefreshMetrics::default(),
        }
    }

    /// Schedule a refresh for a token expiring at `expires_at`.
    ///
    /// Any pending deadline is cancelled first, so there is never more than
    /// one. Returns the delay until the new deadline, or `None` when
    /// refreshing is disabled.
    pub fn arm(&mut self, expires_at: DateTime<Utc>) -> Option<Duration> {
        if !self.config.enabled {
            trace!("refresh disabled, not arming");
            return None;
        }
        if self.pending.is_some() {
            self.metrics.total_disarmed += 1;
        }

        let delay = self.config.delay_until_refresh(expires_at, Utc::now());
        self.sequence += 1;
        self.pending = Some(Pending {
            deadline: TokioInstant::now() + delay,
            expires_at,
            sequence: self.sequence,
        });
        self.metrics.total_armed += 1;

        debug!(
            sequence = self.sequence,
            %expires_at,
            delay_ms = delay.as_millis() as u64,
            "refresh armed"
        );
        Some(delay)
    }

    /// Cancel the pending deadline, if any. Returns `true` if one was
    /// cancelled.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn disarm(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.metrics.total_disarmed += 1;
                debug!(sequence = pending.sequence, "refresh disarmed");
                true
            }
            None => false,
        }
    }

    /// Wait until the pending deadline elapses.
    ///
    /// While disarmed this future pends forever. It is cancel-safe: if a
    /// `select!` drops it early, the deadline stays pending and the next
    /// call waits for the same instant.
    pub async fn wait_for_refresh(&mut self) -> RefreshDue {
        loop {
            let deadline = match &self.pending {
                Some(pending) => pending.deadline,
                None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            };

            time::sleep_until(deadline).await;

            // One-shot: the caller rearms after refreshing.
            if let Some(pending) = self.pending.take() {
                self.metrics.total_fired += 1;
                trace!(sequence = pending.sequence, "refresh due");

                return RefreshDue {
                    expires_at: pending.expires_at,
                    sequence: pending.sequence,
                };
            }
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The expiry the pending deadline was armed against.
    pub fn armed_expiry(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.expires_at)
    }

    /// When the pending deadline fires (Tokio clock).
    pub fn deadline(&self) -> Option<TokioInstant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &RefreshMetrics {
        &self.metrics
    }

    /// The validated configuration.
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }
}
