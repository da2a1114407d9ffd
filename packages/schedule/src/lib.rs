#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cancellable timers.
//!
//! Every wait in the crawl (registry pacing, long pauses, the malfunction
//! cooldown) goes through a [`Sleeper`] so that a [`Shutdown`] signal can
//! abort it and tests can observe the requested durations without real
//! delay.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

/// A wait was aborted by the shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cancelled by shutdown signal")]
pub struct Cancelled;

/// Waits for a duration unless cancelled.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if shutdown was requested before or during
    /// the wait.
    async fn sleep(&self, duration: Duration) -> Result<(), Cancelled>;
}

/// Creates a connected trigger/listener pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Sending half of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signals every [`Shutdown`] listener. Idempotent.
    pub fn trigger(&self) {
        if !*self.tx.borrow() {
            log::info!("Shutdown requested");
        }
        self.tx.send_replace(true);
    }
}

/// Listening half of the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A listener that is never triggered.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the trigger
    /// was dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|triggered| *triggered).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Real-time [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone)]
pub struct TokioSleeper {
    shutdown: Shutdown,
}

impl TokioSleeper {
    #[must_use]
    pub const fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.shutdown.is_triggered() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// A [`Sleeper`] that returns immediately and records every requested
/// duration. Honors an attached [`Shutdown`].
#[derive(Debug)]
pub struct RecordingSleeper {
    shutdown: Shutdown,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for RecordingSleeper {
    fn default() -> Self {
        Self::new(Shutdown::never())
    }
}

impl RecordingSleeper {
    #[must_use]
    pub const fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every duration requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all requested durations.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.shutdown.is_triggered() {
            return Err(Cancelled);
        }
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokio_sleeper_completes_short_sleep() {
        let (_trigger, shutdown) = shutdown_channel();
        let sleeper = TokioSleeper::new(shutdown);
        assert_eq!(sleeper.sleep(Duration::from_millis(1)).await, Ok(()));
    }

    #[tokio::test]
    async fn trigger_aborts_long_sleep() {
        let (trigger, shutdown) = shutdown_channel();
        let sleeper = TokioSleeper::new(shutdown);

        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(3600)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test]
    async fn sleep_after_trigger_is_cancelled_immediately() {
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();
        trigger.trigger();
        assert!(shutdown.is_triggered());

        let sleeper = TokioSleeper::new(shutdown);
        assert_eq!(sleeper.sleep(Duration::from_secs(3600)).await, Err(Cancelled));
    }

    #[tokio::test]
    async fn dropped_trigger_never_cancels() {
        let (trigger, shutdown) = shutdown_channel();
        drop(trigger);

        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.cancelled()).await;
        assert!(waited.is_err());
        assert!(!Shutdown::never().is_triggered());
    }

    #[tokio::test]
    async fn recording_sleeper_records_without_waiting() {
        let sleeper = RecordingSleeper::default();
        sleeper.sleep(Duration::from_secs(300)).await.unwrap();
        sleeper.sleep(Duration::from_millis(800)).await.unwrap();

        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_secs(300), Duration::from_millis(800)]
        );
        assert_eq!(sleeper.total(), Duration::from_millis(300_800));
    }

    #[tokio::test]
    async fn recording_sleeper_honors_shutdown() {
        let (trigger, shutdown) = shutdown_channel();
        let sleeper = RecordingSleeper::new(shutdown);
        trigger.trigger();
        assert_eq!(sleeper.sleep(Duration::from_secs(1)).await, Err(Cancelled));
        assert!(sleeper.sleeps().is_empty());
    }
}
