//! Wait mechanisms.
//!
//! Two primitives live here: a bounded polling loop driven by a [`Clock`],
//! and a network-quiescence tracker that drivers feed with request events.
//! Fixed phase waits are not here; the engine sleeps on the clock directly.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::clock::Clock;
use crate::result::{HarnessError, HarnessResult};

/// Default timeout for entry-page quiescence (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for the post-trigger URL transition (10 seconds)
pub const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// Options for bounded waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of times the condition was checked
    pub polls: u32,
}

/// Poll `check` until it returns `true` or the timeout elapses.
///
/// The condition is always checked at least once, and once more at the
/// deadline, so a condition that becomes true exactly on the boundary is
/// not reported as a timeout. Errors from `check` end the wait immediately.
pub async fn poll_until<C, F, Fut>(
    clock: &C,
    options: &WaitOptions,
    mut check: F,
) -> HarnessResult<WaitResult>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<bool>>,
{
    let start = clock.now();
    let deadline = start + options.timeout();
    let interval = options.poll_interval().max(Duration::from_millis(1));
    let mut polls = 0;

    loop {
        polls += 1;
        if check().await? {
            return Ok(WaitResult {
                elapsed: clock.now().saturating_sub(start),
                polls,
            });
        }
        let now = clock.now();
        if now >= deadline {
            return Err(HarnessError::Timeout {
                ms: options.timeout_ms,
            });
        }
        clock.sleep(interval.min(deadline - now)).await;
    }
}

/// Tracks in-flight requests to decide network quiescence
///
/// Times are offsets from the owning clock's origin.
#[derive(Debug, Clone, Default)]
pub struct NetworkIdleTracker {
    pending: HashSet<String>,
    last_activity: Option<Duration>,
}

impl NetworkIdleTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request being sent
    pub fn request_started(&mut self, id: impl Into<String>, now: Duration) {
        self.pending.insert(id.into());
        self.last_activity = Some(now);
    }

    /// Record a request finishing or failing
    pub fn request_finished(&mut self, id: &str, now: Duration) {
        if self.pending.remove(id) {
            self.last_activity = Some(now);
        }
    }

    /// Forget everything (used when a new navigation begins)
    pub fn reset(&mut self, now: Duration) {
        self.pending.clear();
        self.last_activity = Some(now);
    }

    /// Number of requests still in flight
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Check if the network has been quiet for the idle threshold
    #[must_use]
    pub fn is_idle(&self, now: Duration) -> bool {
        if !self.pending.is_empty() {
            return false;
        }
        match self.last_activity {
            Some(last) => {
                now.saturating_sub(last) >= Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS)
            }
            None => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use std::cell::Cell;

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_NAVIGATION_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_wait_options_chained() {
            let opts = WaitOptions::new().with_timeout(10_000).with_poll_interval(200);
            assert_eq!(opts.timeout(), Duration::from_secs(10));
            assert_eq!(opts.poll_interval(), Duration::from_millis(200));
        }
    }

    mod poll_tests {
        use super::*;

        #[tokio::test]
        async fn test_immediate_success() {
            let clock = VirtualClock::new();
            let result = poll_until(&clock, &WaitOptions::new().with_timeout(100), || async {
                Ok(true)
            })
            .await
            .unwrap();
            assert_eq!(result.polls, 1);
            assert_eq!(result.elapsed, Duration::ZERO);
        }

        #[tokio::test]
        async fn test_times_out_at_deadline() {
            let clock = VirtualClock::new();
            let opts = WaitOptions::new().with_timeout(1000).with_poll_interval(300);
            let result = poll_until(&clock, &opts, || async { Ok(false) }).await;
            match result {
                Err(HarnessError::Timeout { ms }) => assert_eq!(ms, 1000),
                other => panic!("expected timeout, got {other:?}"),
            }
            // Never sleeps past the deadline
            assert_eq!(clock.now_ms(), 1000);
        }

        #[tokio::test]
        async fn test_condition_becomes_true() {
            let clock = VirtualClock::new();
            let observer = clock.clone();
            let opts = WaitOptions::new().with_timeout(5000).with_poll_interval(100);
            let result = poll_until(&clock, &opts, || {
                let ready = observer.now_ms() >= 750;
                async move { Ok(ready) }
            })
            .await
            .unwrap();
            assert_eq!(result.elapsed, Duration::from_millis(800));
        }

        #[tokio::test]
        async fn test_check_error_aborts() {
            let clock = VirtualClock::new();
            let calls = Cell::new(0);
            let result = poll_until(&clock, &WaitOptions::new(), || {
                calls.set(calls.get() + 1);
                async { Err(HarnessError::driver("url", "disconnected")) }
            })
            .await;
            assert!(matches!(result, Err(HarnessError::Driver { .. })));
            assert_eq!(calls.get(), 1);
        }
    }

    mod network_idle_tests {
        use super::*;

        #[test]
        fn test_no_activity_is_idle() {
            let tracker = NetworkIdleTracker::new();
            assert!(tracker.is_idle(Duration::ZERO));
        }

        #[test]
        fn test_pending_request_blocks_idle() {
            let mut tracker = NetworkIdleTracker::new();
            tracker.request_started("1", Duration::ZERO);
            assert_eq!(tracker.pending_requests(), 1);
            assert!(!tracker.is_idle(Duration::from_secs(10)));
        }

        #[test]
        fn test_idle_after_threshold() {
            let mut tracker = NetworkIdleTracker::new();
            tracker.request_started("1", Duration::ZERO);
            tracker.request_finished("1", Duration::from_millis(100));
            assert!(!tracker.is_idle(Duration::from_millis(599)));
            assert!(tracker.is_idle(Duration::from_millis(600)));
        }

        #[test]
        fn test_unknown_request_finish_ignored() {
            let mut tracker = NetworkIdleTracker::new();
            tracker.request_finished("ghost", Duration::from_secs(1));
            assert!(tracker.is_idle(Duration::from_secs(1)));
        }

        #[test]
        fn test_reset_clears_pending() {
            let mut tracker = NetworkIdleTracker::new();
            tracker.request_started("1", Duration::ZERO);
            tracker.reset(Duration::from_millis(200));
            assert_eq!(tracker.pending_requests(), 0);
            assert!(tracker.is_idle(Duration::from_millis(700)));
        }
    }
}
