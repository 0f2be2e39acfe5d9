// Announcer Port
// Secondary, best-effort accessibility channel for state changes that are
// not visually apparent (refresh finished, threshold crossed).

/// Announcer port. Implementations must never fail loudly; announcing is
/// strictly best-effort.
pub trait Announcer: Send + Sync {
    fn announce(&self, message: &str);
}

/// Predefined announcement messages for consistency
pub mod messages {
    /// Announcement after a successful refresh
    pub const REFRESH_COMPLETE: &str = "Usage data updated";

    /// Announcement when a refresh fails
    pub const REFRESH_FAILED: &str = "Unable to refresh usage data";

    /// Announcement for a usage reset
    pub const RESET_COMPLETE: &str = "Usage limit has reset. Full capacity available.";

    /// Announcement for a crossed warning threshold
    pub fn warning_threshold(percentage: i64) -> String {
        format!("Warning: usage at {} percent", percentage)
    }

    /// Announcement for an exhausted window
    pub fn capacity_full(window_label: &str) -> String {
        format!("{} limit reached", window_label)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock announcer that records every message
    #[derive(Default)]
    pub struct MockAnnouncer {
        messages: Mutex<Vec<String>>,
    }

    impl MockAnnouncer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Announcer for MockAnnouncer {
        fn announce(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}
