//! Cooperative stop and pause signalling

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// What a worker should do at a per-item boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Continue,
    Stop,
}

/// Shared stop/pause flags with a wakeup channel
///
/// Workers await [`Control::gate`] between items; the call blocks while
/// paused instead of spinning, and a stop request wins over a pause.
#[derive(Debug, Default)]
pub struct Control {
    stop: AtomicBool,
    paused: AtomicBool,
    notify: Notify,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears both flags for a fresh job
    pub fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Completes once a stop has been requested
    pub async fn stopped(&self) {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.notify.notified();
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Blocks while paused; returns as soon as the worker may continue or
    /// must stop
    pub async fn gate(&self) -> Gate {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Gate::Stop;
            }
            if !self.paused.load(Ordering::SeqCst) {
                return Gate::Continue;
            }

            // Register for the wakeup before re-checking, otherwise a
            // resume between the check and the await is lost
            let notified = self.notify.notified();
            if self.stop.load(Ordering::SeqCst) {
                return Gate::Stop;
            }
            if !self.paused.load(Ordering::SeqCst) {
                return Gate::Continue;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_gate_continues_by_default() {
        let control = Control::new();
        assert_eq!(control.gate().await, Gate::Continue);
    }

    #[tokio::test]
    async fn test_stop_wins_over_pause() {
        let control = Control::new();
        control.pause();
        control.request_stop();
        assert_eq!(control.gate().await, Gate::Stop);
    }

    #[tokio::test]
    async fn test_gate_blocks_while_paused() {
        let control = Arc::new(Control::new());
        control.pause();

        let gated = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.gate().await })
        };

        // The gate should still be blocked after a short wait
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!gated.is_finished());

        control.resume();
        assert_eq!(gated.await.unwrap(), Gate::Continue);
    }

    #[tokio::test]
    async fn test_stop_releases_a_paused_gate() {
        let control = Arc::new(Control::new());
        control.pause();

        let gated = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.gate().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        control.request_stop();
        assert_eq!(gated.await.unwrap(), Gate::Stop);
    }

    #[tokio::test]
    async fn test_reset_clears_both_flags() {
        let control = Control::new();
        control.pause();
        control.request_stop();
        control.reset();
        assert!(!control.is_paused());
        assert!(!control.is_stop_requested());
        assert_eq!(control.gate().await, Gate::Continue);
    }
}
