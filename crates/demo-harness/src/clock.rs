//! Time sources for phase synchronization.
//!
//! The engine measures phase offsets against a [`Clock`] rather than
//! reading wall time directly, so the same control flow runs against a
//! real browser ([`SystemClock`]) and against a scripted driver that
//! shares a [`VirtualClock`] and completes every wait instantly.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic time source
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);

    /// Suspend until `deadline` (a value previously comparable to [`Clock::now`])
    async fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now).await;
        }
    }
}

/// Real monotonic clock backed by tokio time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock for deterministic tests
///
/// Cloning shares the underlying time. `sleep` advances time by exactly the
/// requested amount and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    current_ms: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Create a virtual clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time without sleeping
    pub fn advance(&self, duration: Duration) {
        self.current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Current time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_virtual_clock_sleep_advances() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_millis(1500)).await;
        assert_eq!(clock.now_ms(), 1500);
    }

    #[tokio::test]
    async fn test_virtual_clock_clones_share_time() {
        let clock = VirtualClock::new();
        let other = clock.clone();
        other.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_until_past_deadline_is_noop() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_secs(10));
        clock.sleep_until(Duration::from_secs(4)).await;
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_sleep_until_future_deadline() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(1200));
        clock.sleep_until(Duration::from_millis(5000)).await;
        assert_eq!(clock.now_ms(), 5000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_tracks_tokio_time() {
        let clock = SystemClock::new();
        clock.sleep(Duration::from_secs(3)).await;
        assert!(clock.now() >= Duration::from_secs(3));
    }
}
