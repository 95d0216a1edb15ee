//! Timeout and retry policy for side effects.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{Result, WorkflowError};

/// How a side effect is run: a bound on each attempt and how often to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityOptions {
    /// Upper bound for a single attempt.
    pub start_to_close_timeout: Duration,
    /// Attempts in total, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl ActivityOptions {
    pub fn new(start_to_close_timeout: Duration) -> Self {
        Self {
            start_to_close_timeout,
            max_attempts: 1,
            retry_backoff: Duration::from_millis(200),
        }
    }

    /// Defaults for shipment booking and notifications.
    pub fn shipment() -> Self {
        Self::new(Duration::from_secs(5))
    }

    /// Defaults for invoicing and charging.
    pub fn billing() -> Self {
        Self::new(Duration::from_secs(30))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self::shipment()
    }
}

/// Runs `call` under `options`.
///
/// Each attempt is bounded by the start-to-close timeout. Failed attempts
/// are retried up to `max_attempts`, except for errors that retrying cannot
/// fix (validation, missing instances).
pub async fn execute<T, F, Fut>(activity: &'static str, options: &ActivityOptions, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let started = Instant::now();
        let result = match tokio::time::timeout(options.start_to_close_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(WorkflowError::Timeout { activity }),
        };
        metrics::histogram!("activity_duration_seconds", "activity" => activity)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && !err.is_permanent() => {
                tracing::warn!(activity, attempt, error = %err, "activity failed, retrying");
                tokio::time::sleep(options.retry_backoff).await;
                attempt += 1;
            }
            Err(err) => {
                metrics::counter!("activity_failed_total", "activity" => activity).increment(1);
                tracing::warn!(activity, attempt, error = %err, "activity failed");
                return Err(err);
            }
        }
    }
}
