//! Retry policy for generation calls.
//!
//! Pure decision logic: given the attempt that just failed and its error,
//! decide whether to try again and how long to wait. The executor does the
//! sleeping and logging.

use std::time::Duration;

use colloquy_types::config::LlmConfig;
use colloquy_types::llm::LlmError;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Bounded linear backoff; rate limits wait twice as long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs_f64(config.retry_delay_secs.max(0.0)),
        )
    }

    /// Decide after `attempt` (1-based) failed with `error`.
    pub fn next(&self, attempt: u32, error: &LlmError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let mut delay = self.base_delay * attempt;
        if let LlmError::RateLimited { retry_after_ms } = error {
            delay *= 2;
            if let Some(ms) = retry_after_ms {
                delay = delay.max(Duration::from_millis(*ms));
            }
        }
        RetryDecision::Retry { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2))
    }

    #[test]
    fn delay_grows_linearly() {
        let p = policy();
        assert_eq!(
            p.next(1, &LlmError::Timeout),
            RetryDecision::Retry {
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            p.next(2, &LlmError::Connection("reset".into())),
            RetryDecision::Retry {
                delay: Duration::from_secs(4)
            }
        );
        assert_eq!(p.next(3, &LlmError::Timeout), RetryDecision::GiveUp);
    }

    #[test]
    fn rate_limit_doubles_delay() {
        let p = policy();
        let err = LlmError::RateLimited {
            retry_after_ms: None,
        };
        assert_eq!(
            p.next(2, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(8)
            }
        );
        let err = LlmError::RateLimited {
            retry_after_ms: Some(30_000),
        };
        assert_eq!(
            p.next(1, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn client_and_unknown_errors_are_final() {
        let p = policy();
        let client = LlmError::Client {
            status: 400,
            message: "context length exceeded".into(),
        };
        assert_eq!(p.next(1, &client), RetryDecision::GiveUp);
        assert_eq!(p.next(1, &LlmError::Unknown("?".into())), RetryDecision::GiveUp);
    }

    #[test]
    fn zero_attempts_still_allows_one_call() {
        let p = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.next(1, &LlmError::Timeout), RetryDecision::GiveUp);
    }
}
