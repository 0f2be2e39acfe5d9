// System State Observer Port
// Reports the host activity classification and power source. The core
// polls these synchronously on demand; there are no callbacks.

use serde::{Deserialize, Serialize};

/// Host activity classification driving the refresh policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// User actively working
    Active,
    /// No user activity for the idle threshold
    Idle,
    /// Display off / host suspended - polling is pointless
    Sleeping,
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemState::Active => write!(f, "active"),
            SystemState::Idle => write!(f, "idle"),
            SystemState::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// System state observer port
pub trait SystemStateObserver: Send + Sync {
    fn current_state(&self) -> SystemState;
    fn is_on_battery(&self) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Mock observer with settable state
    pub struct MockSystemStateObserver {
        state: Mutex<SystemState>,
        on_battery: AtomicBool,
    }

    impl MockSystemStateObserver {
        pub fn new(state: SystemState, on_battery: bool) -> Self {
            Self {
                state: Mutex::new(state),
                on_battery: AtomicBool::new(on_battery),
            }
        }

        pub fn active_on_ac() -> Self {
            Self::new(SystemState::Active, false)
        }

        pub fn set_state(&self, state: SystemState) {
            *self.state.lock().unwrap() = state;
        }

        pub fn set_on_battery(&self, on_battery: bool) {
            self.on_battery.store(on_battery, Ordering::SeqCst);
        }
    }

    impl SystemStateObserver for MockSystemStateObserver {
        fn current_state(&self) -> SystemState {
            *self.state.lock().unwrap()
        }

        fn is_on_battery(&self) -> bool {
            self.on_battery.load(Ordering::SeqCst)
        }
    }
}
