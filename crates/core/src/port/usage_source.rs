// Usage Source Port
// Abstraction over wherever usage readings come from (API client, command,
// fixture). The wire format is the adapter's business, not the core's.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::UsageReading;

/// Closed fetch-failure taxonomy.
///
/// Adapters must map every unclassified failure onto `Network`; nothing
/// outside this enum ever reaches the coordinator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Credentials missing or rejected. Never auto-retried: the user has
    /// to act before another attempt can succeed.
    #[error("not authenticated with the usage provider")]
    NotAuthenticated,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode usage payload: {0}")]
    Decode(String),

    /// Server-side throttle with an explicit wait. The retry delay comes
    /// from the server, bypassing the exponential backoff formula.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl FetchError {
    /// Whether this failure may be retried automatically.
    ///
    /// Only `NotAuthenticated` is non-retryable; it also must not escalate
    /// the backoff counter.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotAuthenticated)
    }
}

/// Data source port: one fetch, one atomically-produced reading.
///
/// The core imposes no timeout on this call; that belongs to the adapter.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn fetch_usage(&self) -> Result<UsageReading, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock UsageSource driven by a script of outcomes.
    ///
    /// Outcomes pushed with [`MockUsageSource::push`] are returned in order;
    /// once the script is exhausted the fallback outcome repeats. An
    /// optional artificial delay makes single-flight behavior observable.
    pub struct MockUsageSource {
        script: Mutex<VecDeque<Result<UsageReading, FetchError>>>,
        fallback: Mutex<Result<UsageReading, FetchError>>,
        delay: Mutex<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MockUsageSource {
        pub fn always(outcome: Result<UsageReading, FetchError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(outcome),
                delay: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// Queue one outcome ahead of the fallback
        pub fn push(&self, outcome: Result<UsageReading, FetchError>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        /// Replace the fallback outcome returned once the script runs out
        pub fn set_fallback(&self, outcome: Result<UsageReading, FetchError>) {
            *self.fallback.lock().unwrap() = outcome;
        }

        /// Artificial latency applied to every fetch
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UsageSource for MockUsageSource {
        async fn fetch_usage(&self) -> Result<UsageReading, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            self.fallback.lock().unwrap().clone()
        }
    }
}
