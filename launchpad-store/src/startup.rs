//! Startup gate: keep trying to reach the store before serving traffic.

use std::fmt::Display;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};

/// How many times to try reaching the store, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(2),
        }
    }
}

/// Runs `attempt` until it succeeds or `policy.max_attempts` is spent.
///
/// Each failure is logged and followed by `policy.delay`, except the last,
/// which is reported as [`StorageError::RetriesExhausted`]. A policy with
/// zero attempts still tries once.
pub async fn connect_with_retry<T, E, F, Fut>(policy: RetryPolicy, mut attempt: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt().await {
            Ok(value) => {
                if n > 1 {
                    info!(attempts = n, "store reachable");
                }
                return Ok(value);
            }
            Err(err) if n >= max_attempts => {
                return Err(StorageError::RetriesExhausted {
                    attempts: n,
                    last_error: err.to_string(),
                });
            }
            Err(err) => {
                warn!(
                    attempt = n,
                    max_attempts,
                    error = %err,
                    "store not ready, retrying in {:?}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                n += 1;
            }
        }
    }
}
