//! Polling pacing for adapters that drive asynchronous remotes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Paces a polling loop: `wait` sleeps before the next attempt and errors
/// once its patience is exhausted, so no poll loop can spin forever.
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self, operation: &'static str, path: &str, attempt: u32) -> StorageResult<()>;
}

/// Fixed-interval polling. The coarse one-second default fits remotes whose
/// transfer time dominates the backup.
#[derive(Debug, Clone)]
pub struct PollInterval {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollInterval {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 900,
        }
    }
}

#[async_trait]
impl Waiter for PollInterval {
    async fn wait(&self, operation: &'static str, path: &str, attempt: u32) -> StorageResult<()> {
        if attempt >= self.max_attempts {
            return Err(StorageError::Timeout {
                operation,
                path: path.to_string(),
            });
        }
        tokio::time::sleep(self.interval).await;
        Ok(())
    }
}

/// Exponential backoff with a ceiling, for remotes that penalize tight
/// polling.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(15),
            max_attempts: 60,
        }
    }
}

#[async_trait]
impl Waiter for Backoff {
    async fn wait(&self, operation: &'static str, path: &str, attempt: u32) -> StorageResult<()> {
        if attempt >= self.max_attempts {
            return Err(StorageError::Timeout {
                operation,
                path: path.to_string(),
            });
        }
        let delay = self
            .initial
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max);
        tokio::time::sleep(delay).await;
        Ok(())
    }
}
