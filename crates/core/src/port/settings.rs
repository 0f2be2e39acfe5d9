// Settings Provider Port
// Read-only view of user preferences. The core never mutates settings;
// persistence and import/export belong to the adapter side.

use std::time::Duration;

/// Settings provider port.
///
/// `warning_threshold` is clamped to 50-99 by the provider, not here.
pub trait SettingsProvider: Send + Sync {
    /// Baseline polling interval chosen by the user
    fn refresh_interval(&self) -> Duration;

    /// Master switch for state-aware interval adjustment
    fn power_aware_enabled(&self) -> bool;

    /// Stretch the interval while on battery (only meaningful when
    /// power-aware refresh is enabled)
    fn reduce_on_battery(&self) -> bool;

    /// Master notification toggle; when off, every check is skipped
    /// regardless of the per-kind toggles
    fn notifications_enabled(&self) -> bool;

    fn warning_enabled(&self) -> bool;
    fn capacity_full_enabled(&self) -> bool;
    fn reset_complete_enabled(&self) -> bool;

    /// Warning threshold percent, 50-99
    fn warning_threshold(&self) -> u8;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct SettingsValues {
        pub refresh_interval: Duration,
        pub power_aware_enabled: bool,
        pub reduce_on_battery: bool,
        pub notifications_enabled: bool,
        pub warning_enabled: bool,
        pub capacity_full_enabled: bool,
        pub reset_complete_enabled: bool,
        pub warning_threshold: u8,
    }

    impl Default for SettingsValues {
        fn default() -> Self {
            Self {
                refresh_interval: Duration::from_secs(300),
                power_aware_enabled: true,
                reduce_on_battery: true,
                notifications_enabled: true,
                warning_enabled: true,
                capacity_full_enabled: true,
                reset_complete_enabled: true,
                warning_threshold: 80,
            }
        }
    }

    /// Mock settings with mutable fields
    #[derive(Default)]
    pub struct MockSettings {
        values: Mutex<SettingsValues>,
    }

    impl MockSettings {
        pub fn new(values: SettingsValues) -> Self {
            Self {
                values: Mutex::new(values),
            }
        }

        pub fn update(&self, f: impl FnOnce(&mut SettingsValues)) {
            f(&mut self.values.lock().unwrap());
        }
    }

    impl SettingsProvider for MockSettings {
        fn refresh_interval(&self) -> Duration {
            self.values.lock().unwrap().refresh_interval
        }

        fn power_aware_enabled(&self) -> bool {
            self.values.lock().unwrap().power_aware_enabled
        }

        fn reduce_on_battery(&self) -> bool {
            self.values.lock().unwrap().reduce_on_battery
        }

        fn notifications_enabled(&self) -> bool {
            self.values.lock().unwrap().notifications_enabled
        }

        fn warning_enabled(&self) -> bool {
            self.values.lock().unwrap().warning_enabled
        }

        fn capacity_full_enabled(&self) -> bool {
            self.values.lock().unwrap().capacity_full_enabled
        }

        fn reset_complete_enabled(&self) -> bool {
            self.values.lock().unwrap().reset_complete_enabled
        }

        fn warning_threshold(&self) -> u8 {
            self.values.lock().unwrap().warning_threshold
        }
    }
}
