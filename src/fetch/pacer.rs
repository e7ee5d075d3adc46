//! Per-source request pacing

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
///
/// One `Pacer` per source serializes that source's requests: callers await
/// [`Pacer::wait`] before every request, and the internal lock is held through
/// the sleep so concurrent callers queue up instead of stampeding.
pub struct Pacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Blocks until the minimum interval since the previous request has passed
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let before = Instant::now();
        pacer.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_out_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(500));
        pacer.wait().await;

        let before = Instant::now();
        pacer.wait().await;
        assert!(before.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_the_interval() {
        let pacer = Pacer::new(Duration::from_millis(500));
        pacer.wait().await;

        tokio::time::sleep(Duration::from_millis(400)).await;

        let before = Instant::now();
        pacer.wait().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(500));
    }
}
