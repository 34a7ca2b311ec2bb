//! Abstraction for the backoff wait.
//!
//! The sink races every wait against its disconnect signal, so a sleeper only has to produce a
//! future. Tests swap in [`InstantSleeper`] or [`TrackingSleeper`] to run the reconnect loop
//! without wall-clock delays.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Boxed wait future returned by a [`Sleeper`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Abstraction for sleeping/waiting
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Production sleeper using the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Test sleeper that only yields to the scheduler.
///
/// Yielding keeps a tight reconnect loop from starving other tasks on a current-thread runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> SleepFuture {
        Box::pin(tokio::task::yield_now())
    }
}

/// Test sleeper that records every requested wait, then yields like [`InstantSleeper`].
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instant_sleeper_doesnt_sleep() {
        let start = std::time::Instant::now();
        InstantSleeper.sleep(Duration::from_secs(10)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn tracking_sleeper_records_calls() {
        let sleeper = TrackingSleeper::new();

        sleeper.sleep(Duration::from_millis(1)).await;
        sleeper.sleep(Duration::from_millis(2)).await;
        sleeper.sleep(Duration::from_millis(4)).await;

        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_millis(1), Duration::from_millis(2), Duration::from_millis(4)]
        );

        sleeper.clear();
        assert!(sleeper.is_empty());
    }

    #[tokio::test]
    async fn tracking_sleeper_clones_share_history() {
        let sleeper = TrackingSleeper::new();
        let clone = sleeper.clone();
        clone.sleep(Duration::from_millis(3)).await;
        assert_eq!(sleeper.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_follows_the_timer() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(50)).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
