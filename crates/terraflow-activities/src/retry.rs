//! Retry policy for activity execution.
//!
//! The engine wraps every activity invocation with [`with_retry`]: each
//! attempt runs under an upper wall-clock bound, transient failures are
//! retried with exponential backoff, and fatal failures surface
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ActivityError;

/// Exponential-backoff retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub initial_interval: Duration,
  pub backoff_coefficient: f64,
  pub max_interval: Duration,
  /// Upper bound applied to each attempt.
  pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_interval: Duration::from_secs(5),
      backoff_coefficient: 2.0,
      max_interval: Duration::from_secs(60),
      attempt_timeout: Duration::from_secs(600),
    }
  }
}

impl RetryPolicy {
  /// Backoff before the given 1-based attempt number.
  fn interval_before(&self, attempt: u32) -> Duration {
    let factor = self.backoff_coefficient.powi(attempt.saturating_sub(2) as i32);
    let interval = self.initial_interval.mul_f64(factor);
    interval.min(self.max_interval)
  }
}

/// Runs `operation` under the policy, retrying transient failures.
pub async fn with_retry<T, F, Fut>(
  policy: &RetryPolicy,
  operation_name: &str,
  mut operation: F,
) -> Result<T, ActivityError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, ActivityError>>,
{
  let mut attempt = 0;
  loop {
    attempt += 1;

    let result = match tokio::time::timeout(policy.attempt_timeout, operation()).await {
      Ok(result) => result,
      Err(_) => Err(ActivityError::Timeout {
        operation: operation_name.to_string(),
        seconds: policy.attempt_timeout.as_secs(),
      }),
    };

    match result {
      Ok(value) => return Ok(value),
      Err(e) if e.is_transient() && attempt < policy.max_attempts => {
        let backoff = policy.interval_before(attempt + 1);
        warn!(
          operation = operation_name,
          attempt,
          backoff_ms = backoff.as_millis() as u64,
          error = %e,
          "activity failed, retrying"
        );
        tokio::time::sleep(backoff).await;
      }
      Err(e) => return Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn fast_policy() -> RetryPolicy {
    RetryPolicy {
      max_attempts: 3,
      initial_interval: Duration::from_millis(1),
      backoff_coefficient: 2.0,
      max_interval: Duration::from_millis(4),
      attempt_timeout: Duration::from_secs(5),
    }
  }

  #[tokio::test]
  async fn returns_first_success() {
    let calls = AtomicU32::new(0);
    let result = with_retry(&fast_policy(), "init", || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Ok::<_, ActivityError>(42) }
    })
    .await
    .unwrap();

    assert_eq!(result, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn retries_transient_failures_up_to_max_attempts() {
    let calls = AtomicU32::new(0);
    let err = with_retry(&fast_policy(), "plan", || {
      calls.fetch_add(1, Ordering::SeqCst);
      async {
        Err::<(), _>(ActivityError::ToolFailed {
          operation: "plan".to_string(),
          code: "1".to_string(),
          output: "boom".to_string(),
        })
      }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, ActivityError::ToolFailed { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn recovers_when_a_later_attempt_succeeds() {
    let calls = AtomicU32::new(0);
    let result = with_retry(&fast_policy(), "apply", || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < 1 {
          Err(ActivityError::ToolFailed {
            operation: "apply".to_string(),
            code: "1".to_string(),
            output: "flake".to_string(),
          })
        } else {
          Ok(())
        }
      }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn does_not_retry_fatal_failures() {
    let calls = AtomicU32::new(0);
    let err = with_retry(&fast_policy(), "apply", || {
      calls.fetch_add(1, Ordering::SeqCst);
      async {
        Err::<(), _>(ActivityError::PlanFileMissing {
          path: "/tmp/w/tfplan".into(),
        })
      }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, ActivityError::PlanFileMissing { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn backoff_is_capped_at_max_interval() {
    let policy = RetryPolicy {
      max_attempts: 10,
      initial_interval: Duration::from_secs(5),
      backoff_coefficient: 2.0,
      max_interval: Duration::from_secs(60),
      attempt_timeout: Duration::from_secs(600),
    };

    assert_eq!(policy.interval_before(2), Duration::from_secs(5));
    assert_eq!(policy.interval_before(3), Duration::from_secs(10));
    assert_eq!(policy.interval_before(6), Duration::from_secs(60));
  }
}
