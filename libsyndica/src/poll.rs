//! Bounded-attempt readiness polling
//!
//! Every adapter with a processing-delay step (video transcoding, carousel
//! item ingestion) waits through this primitive instead of hand-rolling its
//! own retry loop. Two terminal-success semantics occur in the wild and both
//! are expressed as `check` closures: an explicit "finished" status sentinel
//! (with an explicit error sentinel causing immediate failure), and mere
//! resolvability of the resource (any successful fetch is terminal).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Outcome of a single poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Terminal success; stop polling.
    Ready,
    /// Not ready yet; carries the attempt's diagnostic so the final one can
    /// be surfaced if the budget runs out.
    Retry(String),
    /// Terminal failure (explicit error sentinel); stop without exhausting
    /// the budget.
    Fail(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Processing failed: {0}")]
    Failed(String),

    /// Attempt budget exhausted; `last` is the final attempt's diagnostic.
    #[error("Timed out after {attempts} attempts: {last}")]
    Timeout { attempts: u32, last: String },
}

/// Fixed-interval poller with an attempt budget.
///
/// The inter-attempt wait is scoped to the single polling call; concurrent
/// polls elsewhere are unaffected.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `check` until it is terminal or the budget is exhausted.
    ///
    /// Returns the number of attempts used on success. Terminates within
    /// exactly `min(k, max_attempts)` attempts where k is the first terminal
    /// attempt, or with `PollError::Timeout` after exactly `max_attempts`.
    pub async fn run<F, Fut>(&self, mut check: F) -> Result<u32, PollError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PollDecision>,
    {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            match check(attempt).await {
                PollDecision::Ready => return Ok(attempt),
                PollDecision::Fail(diagnostic) => return Err(PollError::Failed(diagnostic)),
                PollDecision::Retry(diagnostic) => {
                    debug!(attempt, max = self.max_attempts, "Not ready, waiting");
                    last = diagnostic;
                    if attempt < self.max_attempts {
                        sleep(self.interval).await;
                    }
                }
            }
        }

        Err(PollError::Timeout {
            attempts: self.max_attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_poller(max_attempts: u32) -> Poller {
        Poller::new(Duration::from_millis(0), max_attempts)
    }

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let used = fast_poller(5)
            .run(|_| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    PollDecision::Ready
                }
            })
            .await
            .unwrap();

        assert_eq!(used, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_after_retries_uses_exactly_k_attempts() {
        let used = fast_poller(10)
            .run(|attempt| async move {
                if attempt < 4 {
                    PollDecision::Retry("in progress".into())
                } else {
                    PollDecision::Ready
                }
            })
            .await
            .unwrap();

        assert_eq!(used, 4);
    }

    #[tokio::test]
    async fn test_fail_sentinel_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let err = fast_poller(10)
            .run(|attempt| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt == 2 {
                        PollDecision::Fail("status_code=ERROR".into())
                    } else {
                        PollDecision::Retry("in progress".into())
                    }
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err, PollError::Failed("status_code=ERROR".into()));
        // Budget not exhausted: stopped at the error sentinel
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_after_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let err = fast_poller(3)
            .run(|attempt| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    PollDecision::Retry(format!("attempt {}", attempt))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            PollError::Timeout { attempts, last } => {
                assert_eq!(attempts, 3);
                // Only the final attempt's diagnostic is surfaced
                assert_eq!(last, "attempt 3");
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_existence_semantics_any_success_is_terminal() {
        // Existence-style check: fetch failures are Retry, any success Ready
        let used = fast_poller(5)
            .run(|attempt| async move {
                if attempt < 2 {
                    PollDecision::Retry("404 not found".into())
                } else {
                    PollDecision::Ready
                }
            })
            .await
            .unwrap();

        assert_eq!(used, 2);
    }
}
