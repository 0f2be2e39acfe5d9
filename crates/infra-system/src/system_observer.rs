// System state observer backed by sysinfo and the power-supply sysfs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::debug;

use quotawatch_core::port::system_state::{SystemState, SystemStateObserver};

/// CPU usage below which a sample counts toward idleness (percent)
const IDLE_CPU_THRESHOLD: f32 = 10.0;

/// How long the CPU must stay below the threshold before Idle is reported
const IDLE_WINDOW: Duration = Duration::from_secs(300);

/// Bounded CPU sample history (one sample per state query)
const IDLE_TRACKER_MAX_SAMPLES: usize = 60;

/// Tracks CPU usage history for idle detection
struct IdleTracker {
    samples: Vec<(Instant, f32)>,
    max_samples: usize,
}

impl IdleTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::new(),
            max_samples,
        }
    }

    fn record(&mut self, cpu_usage: f32) {
        self.samples.push((Instant::now(), cpu_usage));
        if self.samples.len() > self.max_samples {
            self.samples.remove(0);
        }
    }

    /// Idle iff every sample within the window is below the threshold
    fn is_idle(&self, threshold: f32, window: Duration) -> bool {
        let cutoff = Instant::now().checked_sub(window);

        let recent: Vec<&(Instant, f32)> = self
            .samples
            .iter()
            .filter(|(time, _)| cutoff.map_or(true, |c| *time >= c))
            .collect();

        if recent.is_empty() {
            return false;
        }
        recent.iter().all(|(_, cpu)| *cpu < threshold)
    }
}

/// Host activity and power-source observer.
///
/// Activity is inferred from a CPU-idle heuristic: the host counts as idle
/// once CPU usage has stayed under the threshold for the whole window.
/// The Sleeping state cannot be observed from here; the daemon drives it
/// explicitly via [`SystemStateObserverImpl::set_sleeping`] from its host
/// sleep/wake signals.
pub struct SystemStateObserverImpl {
    system: Mutex<System>,
    idle_tracker: Mutex<IdleTracker>,
    sleeping: AtomicBool,
}

impl SystemStateObserverImpl {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            idle_tracker: Mutex::new(IdleTracker::new(IDLE_TRACKER_MAX_SAMPLES)),
            sleeping: AtomicBool::new(false),
        }
    }

    /// Driven by the daemon's host sleep/wake signal handlers
    pub fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::SeqCst);
        debug!(sleeping = %sleeping, "Host sleep state updated");
    }

    fn sample_cpu(&self) -> f32 {
        let mut system = self.system.lock().unwrap();
        system.refresh_cpu();
        system.global_cpu_info().cpu_usage()
    }
}

impl Default for SystemStateObserverImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemStateObserver for SystemStateObserverImpl {
    fn current_state(&self) -> SystemState {
        if self.sleeping.load(Ordering::SeqCst) {
            return SystemState::Sleeping;
        }

        let cpu = self.sample_cpu();
        let mut tracker = self.idle_tracker.lock().unwrap();
        tracker.record(cpu);

        if tracker.is_idle(IDLE_CPU_THRESHOLD, IDLE_WINDOW) {
            SystemState::Idle
        } else {
            SystemState::Active
        }
    }

    fn is_on_battery(&self) -> bool {
        on_battery_power()
    }
}

/// On battery iff a battery power supply exists and no mains adapter
/// reports online.
#[cfg(target_os = "linux")]
fn on_battery_power() -> bool {
    use std::fs;

    let Ok(entries) = fs::read_dir("/sys/class/power_supply") else {
        return false;
    };

    let mut has_battery = false;
    let mut mains_online = false;

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(kind) = fs::read_to_string(path.join("type")) else {
            continue;
        };
        match kind.trim() {
            "Battery" => has_battery = true,
            "Mains" => {
                if let Ok(online) = fs::read_to_string(path.join("online")) {
                    if online.trim() == "1" {
                        mains_online = true;
                    }
                }
            }
            _ => {}
        }
    }

    has_battery && !mains_online
}

/// Desktops without a power-supply tree count as plugged in
#[cfg(not(target_os = "linux"))]
fn on_battery_power() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_is_never_idle() {
        let tracker = IdleTracker::new(8);
        assert!(!tracker.is_idle(IDLE_CPU_THRESHOLD, IDLE_WINDOW));
    }

    #[test]
    fn consistently_low_samples_count_as_idle() {
        let mut tracker = IdleTracker::new(8);
        for _ in 0..5 {
            tracker.record(1.0);
        }
        assert!(tracker.is_idle(IDLE_CPU_THRESHOLD, IDLE_WINDOW));
    }

    #[test]
    fn a_busy_sample_breaks_idleness() {
        let mut tracker = IdleTracker::new(8);
        tracker.record(1.0);
        tracker.record(80.0);
        assert!(!tracker.is_idle(IDLE_CPU_THRESHOLD, IDLE_WINDOW));
    }

    #[test]
    fn tracker_is_bounded() {
        let mut tracker = IdleTracker::new(4);
        for _ in 0..10 {
            tracker.record(1.0);
        }
        assert_eq!(tracker.samples.len(), 4);
    }

    #[test]
    fn sleeping_overrides_activity() {
        let observer = SystemStateObserverImpl::new();
        observer.set_sleeping(true);
        assert_eq!(observer.current_state(), SystemState::Sleeping);
        observer.set_sleeping(false);
        assert_ne!(observer.current_state(), SystemState::Sleeping);
    }
}
