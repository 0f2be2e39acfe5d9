// Refresh Interval Policy
// Pure mapping from (user interval, system state, power source, usage)
// to the effective polling cadence.

use std::time::Duration;

use tracing::debug;

use crate::application::constants::{
    CRITICAL_INTERVAL, CRITICAL_USAGE_THRESHOLD, MAX_IDLE_INTERVAL,
};
use crate::port::system_state::SystemState;

/// Effective polling cadence. A tagged variant rather than an infinite
/// float, so nothing can accidentally do arithmetic on "suspended".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    /// Polling is pointless right now (host sleeping)
    Suspended,
    Every(Duration),
}

impl PollInterval {
    pub fn is_suspended(&self) -> bool {
        matches!(self, PollInterval::Suspended)
    }
}

/// Inputs to the interval computation
#[derive(Debug, Clone)]
pub struct PolicyInputs {
    /// Baseline interval chosen by the user
    pub user_interval: Duration,
    pub power_aware_enabled: bool,
    pub reduce_on_battery: bool,
    pub system_state: SystemState,
    pub on_battery: bool,
    /// Highest utilization across all windows, None before the first fetch
    pub highest_utilization: Option<f64>,
}

/// Compute the effective polling interval.
///
/// Precedence, most important first:
/// 1. Power-aware disabled: always the user interval.
/// 2. Sleeping: suspended entirely, not merely slowed.
/// 3. Critical usage (>= 90%) while active: never slower than 2 minutes,
///    even on battery. Critical monitoring must not be traded for power.
/// 4. Battery reduction (idle or active): double the interval, capped at
///    30 minutes.
pub fn effective_interval(inputs: &PolicyInputs) -> PollInterval {
    if !inputs.power_aware_enabled {
        return PollInterval::Every(inputs.user_interval);
    }

    let interval = match inputs.system_state {
        SystemState::Sleeping => return PollInterval::Suspended,

        SystemState::Idle => {
            if inputs.on_battery && inputs.reduce_on_battery {
                battery_stretched(inputs.user_interval)
            } else {
                inputs.user_interval
            }
        }

        SystemState::Active => {
            if inputs
                .highest_utilization
                .is_some_and(|util| util >= CRITICAL_USAGE_THRESHOLD)
            {
                inputs.user_interval.min(CRITICAL_INTERVAL)
            } else if inputs.on_battery && inputs.reduce_on_battery {
                battery_stretched(inputs.user_interval)
            } else {
                inputs.user_interval
            }
        }
    };

    debug!(
        system_state = %inputs.system_state,
        on_battery = %inputs.on_battery,
        effective_secs = %interval.as_secs(),
        "Computed effective refresh interval"
    );

    PollInterval::Every(interval)
}

fn battery_stretched(user_interval: Duration) -> Duration {
    (user_interval * 2).min(MAX_IDLE_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PolicyInputs {
        PolicyInputs {
            user_interval: Duration::from_secs(300),
            power_aware_enabled: true,
            reduce_on_battery: true,
            system_state: SystemState::Active,
            on_battery: false,
            highest_utilization: None,
        }
    }

    #[test]
    fn power_aware_disabled_returns_user_interval_unconditionally() {
        let mut i = inputs();
        i.power_aware_enabled = false;
        i.system_state = SystemState::Sleeping;
        i.on_battery = true;
        i.highest_utilization = Some(99.0);

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(300))
        );
    }

    #[test]
    fn sleeping_suspends_regardless_of_other_flags() {
        let mut i = inputs();
        i.system_state = SystemState::Sleeping;
        i.highest_utilization = Some(95.0);
        i.on_battery = true;

        assert_eq!(effective_interval(&i), PollInterval::Suspended);
    }

    #[test]
    fn idle_on_battery_doubles_interval() {
        let mut i = inputs();
        i.system_state = SystemState::Idle;
        i.on_battery = true;

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(600))
        );
    }

    #[test]
    fn idle_doubling_caps_at_thirty_minutes() {
        let mut i = inputs();
        i.system_state = SystemState::Idle;
        i.on_battery = true;
        i.user_interval = Duration::from_secs(1200);

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(1800))
        );
    }

    #[test]
    fn idle_on_ac_uses_user_interval() {
        let mut i = inputs();
        i.system_state = SystemState::Idle;

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(300))
        );
    }

    #[test]
    fn critical_usage_overrides_battery_reduction() {
        let mut i = inputs();
        i.on_battery = true;
        i.highest_utilization = Some(95.0);

        // Battery doubling would give 600s; the critical override wins
        // with 120s.
        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(120))
        );
    }

    #[test]
    fn critical_override_never_stretches_a_short_interval() {
        let mut i = inputs();
        i.user_interval = Duration::from_secs(60);
        i.highest_utilization = Some(92.0);

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(60))
        );
    }

    #[test]
    fn active_on_battery_doubles_when_not_critical() {
        let mut i = inputs();
        i.on_battery = true;
        i.highest_utilization = Some(89.9);

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(600))
        );
    }

    #[test]
    fn active_on_battery_without_reduce_uses_user_interval() {
        let mut i = inputs();
        i.on_battery = true;
        i.reduce_on_battery = false;

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(300))
        );
    }

    #[test]
    fn unknown_utilization_is_not_critical() {
        let mut i = inputs();
        i.highest_utilization = None;

        assert_eq!(
            effective_interval(&i),
            PollInterval::Every(Duration::from_secs(300))
        );
    }
}
