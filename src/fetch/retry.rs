//! Linear backoff with a terminal error class.
//!
//! Each fetch runs through a small state machine:
//!
//! ```text
//! Attempting(n) --ok--------------------------> Success
//! Attempting(n) --terminal error--------------> TerminalFailure
//! Attempting(n) --retryable, n == max---------> TerminalFailure
//! Attempting(n) --retryable, n < max----------> Backoff(n + 1)
//! Backoff(n)    --sleep n * unit--------------> Attempting(n)
//! ```
//!
//! The first attempt never sleeps.

use super::FetchError;
use crate::config::FetchConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub(crate) enum RetryState<T> {
    Attempting { step: u32 },
    Backoff { step: u32 },
    TerminalFailure(FetchError),
    Success(T),
}

/// Transition out of `Attempting { step }` given the attempt's outcome.
pub(crate) fn after_attempt<T>(
    step: u32,
    max_steps: u32,
    outcome: Result<T, FetchError>,
) -> RetryState<T> {
    match outcome {
        Ok(value) => RetryState::Success(value),
        Err(e) if !e.is_retryable() => RetryState::TerminalFailure(e),
        Err(e) if step >= max_steps => RetryState::TerminalFailure(e),
        Err(_) => RetryState::Backoff { step: step + 1 },
    }
}

pub(crate) fn backoff_delay(config: &FetchConfig, step: u32) -> Duration {
    config.backoff_unit * step
}

/// Runs `attempt` until it succeeds, fails terminally, or the backoff
/// budget in `config` is exhausted. The last error is returned.
pub(crate) async fn with_backoff<T, F, Fut>(
    config: &FetchConfig,
    url: &str,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut state = RetryState::Attempting { step: 0 };

    loop {
        state = match state {
            RetryState::Attempting { step } => {
                let outcome = attempt().await;
                if let Err(e) = &outcome {
                    if e.is_retryable() && step >= config.max_backoff_steps {
                        warn!(url, error = %e, "Giving up after exhausting retry budget");
                    } else if e.is_retryable() {
                        debug!(url, step, error = %e, "Fetch attempt failed, backing off");
                    }
                }
                after_attempt(step, config.max_backoff_steps, outcome)
            }
            RetryState::Backoff { step } => {
                tokio::time::sleep(backoff_delay(config, step)).await;
                RetryState::Attempting { step }
            }
            RetryState::TerminalFailure(e) => return Err(e),
            RetryState::Success(value) => return Ok(value),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn transport_error() -> FetchError {
        FetchError::Status {
            url: "http://example.test".to_string(),
            status: 503,
        }
    }

    fn config() -> FetchConfig {
        FetchConfig::default().with_backoff(Duration::from_secs(1), 5)
    }

    #[test]
    fn test_transitions() {
        assert!(matches!(after_attempt(0, 5, Ok(1)), RetryState::Success(1)));
        assert!(matches!(
            after_attempt::<()>(2, 5, Err(transport_error())),
            RetryState::Backoff { step: 3 }
        ));
        assert!(matches!(
            after_attempt::<()>(5, 5, Err(transport_error())),
            RetryState::TerminalFailure(_)
        ));
        assert!(matches!(
            after_attempt::<()>(0, 5, Err(FetchError::NotFound { url: "u".to_string() })),
            RetryState::TerminalFailure(FetchError::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_does_not_sleep() {
        let start = Instant::now();
        let result = with_backoff(&config(), "u", || async { Ok::<_, FetchError>(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result = with_backoff(&config(), "u", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(transport_error())
            } else {
                Ok("body")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 3s
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<(), _> = with_backoff(&config(), "u", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(transport_error())
        })
        .await;

        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(start.elapsed(), config().cumulative_backoff());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_never_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = with_backoff(&config(), "u", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::NotFound { url: "u".to_string() })
        })
        .await;

        assert!(matches!(result, Err(FetchError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
