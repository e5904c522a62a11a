#![forbid(unsafe_code)]

use async_trait::async_trait;
use std::time::Duration;

/// Suspension seam for pacing delays.
///
/// The executor sleeps between fetches so warming never bursts; routing
/// that sleep through a trait lets tests substitute a recording clock and
/// assert on pacing without waiting wall-clock time.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed clock used everywhere outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
