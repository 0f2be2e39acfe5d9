// Notification Sink Port
// Fire-and-forget delivery of user-facing alerts. De-duplication is the
// trigger engine's responsibility, not the sink's.

use async_trait::async_trait;
use thiserror::Error;

/// Delivery failures. Swallowed by the caller: a broken sink must never
/// surface as an engine error or touch the fetch state.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),

    #[error("notification send failed: {0}")]
    SendFailed(String),
}

/// Notification sink port
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. `identifier` is the stable de-duplication
    /// key the engine derived; sinks may use it for replacement semantics.
    async fn send(&self, title: &str, body: &str, identifier: &str) -> Result<(), SinkError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// One recorded delivery
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        pub title: String,
        pub body: String,
        pub identifier: String,
    }

    /// Mock sink that records every send
    #[derive(Default)]
    pub struct MockNotificationSink {
        sent: Mutex<Vec<SentNotification>>,
        fail: AtomicBool,
    }

    impl MockNotificationSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent send fail (for swallow-on-error tests)
        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentNotification> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        /// Identifiers of all recorded sends, in order
        pub fn identifiers(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.identifier.clone())
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for MockNotificationSink {
        async fn send(&self, title: &str, body: &str, identifier: &str) -> Result<(), SinkError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SinkError::SendFailed("mock sink failure".to_string()));
            }
            self.sent.lock().unwrap().push(SentNotification {
                title: title.to_string(),
                body: body.to_string(),
                identifier: identifier.to_string(),
            });
            Ok(())
        }
    }
}
