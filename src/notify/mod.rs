//! Message delivery.
//!
//! A [`Notifier`] pushes one rendered message per call. Retries live in
//! [`RetryPolicy`] so every transport shares the same backoff rules.

pub mod message;
pub mod telegram;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::models::TelegramConfig;

pub use message::{format_number, render_message};
pub use telegram::TelegramNotifier;

/// Outbound message channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a fully rendered message.
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Notifier that only logs, for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        log::info!("[dry-run]\n{text}");
        Ok(())
    }
}

/// Exponential backoff for transient delivery failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// A server-provided `retry_after` replaces the computed backoff.
    pub fn delay_after(&self, attempt: u32, err: &NotifyError) -> Duration {
        let delay = match err {
            NotifyError::RateLimited {
                retry_after: Some(after),
            } => *after,
            _ => {
                let shift = attempt.saturating_sub(1).min(16);
                self.base_backoff.saturating_mul(1u32 << shift)
            }
        };
        delay.min(self.max_backoff)
    }

    /// Run `op` until it succeeds or returns a final error.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<(), NotifyError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), NotifyError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt, &e);
                    log::debug!(
                        "Delivery attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    async fn run_script(
        policy: RetryPolicy,
        script: Vec<Result<(), NotifyError>>,
    ) -> (Result<(), NotifyError>, u32) {
        let script = RefCell::new(VecDeque::from(script));
        let calls = RefCell::new(0);
        let result = policy
            .run(|_| {
                *calls.borrow_mut() += 1;
                let next = script.borrow_mut().pop_front().unwrap_or(Ok(()));
                async move { next }
            })
            .await;
        (result, calls.into_inner())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let err = NotifyError::Transport("reset".into());
        assert_eq!(policy.delay_after(1, &err), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2, &err), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3, &err), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(12, &err), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_honoured_and_capped() {
        let policy = RetryPolicy::default();
        let short = NotifyError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        let long = NotifyError::RateLimited {
            retry_after: Some(Duration::from_secs(300)),
        };
        let unknown = NotifyError::RateLimited { retry_after: None };
        assert_eq!(policy.delay_after(1, &short), Duration::from_secs(7));
        assert_eq!(policy.delay_after(1, &long), Duration::from_secs(30));
        assert_eq!(policy.delay_after(2, &unknown), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let (result, calls) = run_script(
            instant(3),
            vec![
                Err(NotifyError::Transport("502".into())),
                Err(NotifyError::RateLimited {
                    retry_after: Some(Duration::from_secs(1)),
                }),
                Ok(()),
            ],
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (result, calls) = run_script(
            instant(3),
            vec![
                Err(NotifyError::Transport("a".into())),
                Err(NotifyError::Transport("b".into())),
                Err(NotifyError::Transport("c".into())),
                Ok(()),
            ],
        )
        .await;
        assert!(matches!(result, Err(NotifyError::Transport(m)) if m == "c"));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_failures_not_retried() {
        let (result, calls) =
            run_script(instant(3), vec![Err(NotifyError::Auth("401".into()))]).await;
        assert!(matches!(result, Err(NotifyError::Auth(_))));
        assert_eq!(calls, 1);

        let (result, calls) = run_script(
            instant(3),
            vec![Err(NotifyError::Rejected("chat not found".into()))],
        )
        .await;
        assert!(matches!(result, Err(NotifyError::Rejected(_))));
        assert_eq!(calls, 1);
    }
}
