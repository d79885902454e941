//! Configuration types for the ledger and the cascade planner.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry of a whole transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before giving up with `Contention`. Default: 5.
    pub max_attempts: u32,

    /// Deadline for one attempt (reads + commit).
    ///
    /// An attempt that misses it is treated like a write conflict.
    /// Default: 10s.
    pub attempt_timeout: Duration,

    /// First backoff between attempts; doubles per attempt. Default: 20ms.
    pub base_backoff: Duration,

    /// Backoff ceiling. Default: 500ms.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max attempts (at least one attempt always runs).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    /// Sleep before attempt `attempt + 1` (1-based `attempt` just failed).
    ///
    /// Exponential with full jitter so racing writers spread out.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let ceiling = exp.min(self.max_backoff);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(fastrand::u64(0..=ceiling_ms))
    }
}

/// Configuration for the engagement ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Child collection holding engagement records. Default: "likes".
    pub engagement_collection: String,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            engagement_collection: "likes".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engagement_collection(mut self, collection: impl Into<String>) -> Self {
        self.engagement_collection = collection.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Shorthand for `retry.max_attempts`.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(attempts);
        self
    }
}

/// Configuration for cascade deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Child collections drained before a parent is deleted.
    ///
    /// Default: ["likes", "comments", "feedback"].
    pub collections: Vec<String>,

    /// Records fetched and deleted per batch. Default: 100.
    pub page_size: usize,

    /// Collection counted by the parent's `engagement_count`.
    ///
    /// Pages deleted from it decrement the counter in the same transaction,
    /// so an interrupted cascade leaves the counter consistent. Default: "likes".
    #[serde(default = "default_counter_collection")]
    pub counter_collection: Option<String>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_counter_collection() -> Option<String> {
    Some("likes".to_string())
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            collections: vec![
                "likes".to_string(),
                "comments".to_string(),
                "feedback".to_string(),
            ],
            page_size: 100,
            counter_collection: default_counter_collection(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collections(mut self, collections: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.collections = collections.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Set page size (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_counter_collection(mut self, collection: Option<String>) -> Self {
        self.counter_collection = collection;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
