// Fetch Coordinator - single-flight polling loop with backoff

mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::burn_rate::BurnRateEstimator;
use crate::application::constants::{
    BACKOFF_BASE_SECS, BACKOFF_MAX_EXPONENT, BACKOFF_MAX_SECS, MAX_HISTORY_SAMPLES,
    SLEEP_STATE_POLL, STALE_AFTER_SECS, WAKE_REFRESH_DELAY,
};
use crate::application::notifier::NotificationTriggerEngine;
use crate::application::refresh_policy::{self, PolicyInputs, PollInterval};
use crate::domain::snapshot::UsageSnapshot;
use crate::domain::usage::{UsageReading, UsageWindow};
use crate::port::announcer::{messages, Announcer};
use crate::port::settings::SettingsProvider;
use crate::port::system_state::SystemStateObserver;
use crate::port::time_provider::TimeProvider;
use crate::port::usage_source::{FetchError, UsageSource};

/// Snapshot of the coordinator's fetch path state.
///
/// Mutated only on the serialized fetch path; exposed upward as a clone.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub last_reading: Option<UsageReading>,
    /// The reading preceding `last_reading`, kept for display diffing
    pub previous_reading: Option<UsageReading>,
    pub is_fetching: bool,
    pub last_error: Option<FetchError>,
    /// Epoch milliseconds of the last successful fetch
    pub last_success_at: Option<i64>,
    /// Retryable failures since the last success
    pub consecutive_failures: u32,
}

struct RunningLoop {
    shutdown: ShutdownSender,
    handle: JoinHandle<()>,
}

/// Exponential backoff delay after `consecutive_failures` retryable
/// failures: 60s doubling per failure, capped at 15 minutes.
pub fn backoff_delay(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.min(BACKOFF_MAX_EXPONENT);
    let secs = BACKOFF_BASE_SECS.saturating_mul(1u64 << exponent);
    Duration::from_secs(secs.min(BACKOFF_MAX_SECS))
}

/// Owns the polling loop for one account: one fetch at a time, failure
/// tracking with exponential backoff, and the sample history feeding the
/// burn-rate estimator.
///
/// Concurrency: the in-flight guard collapses overlapping `refresh_once`
/// calls into the single active fetch, and notification evaluation runs
/// inside the guarded path, so no fetch ever interleaves with its own
/// alert evaluation. At most one loop runs per coordinator; starting a new
/// one first cancels and awaits the old one.
pub struct FetchCoordinator {
    source: Arc<dyn UsageSource>,
    observer: Arc<dyn SystemStateObserver>,
    settings: Arc<dyn SettingsProvider>,
    engine: Arc<NotificationTriggerEngine>,
    announcer: Arc<dyn Announcer>,
    time: Arc<dyn TimeProvider>,
    estimator: BurnRateEstimator,

    in_flight: AtomicBool,
    state: Mutex<FetchState>,
    /// Newest-first bounded trailing history for the estimator
    history: Mutex<VecDeque<UsageSnapshot>>,
    /// Session reset timestamp seen on the previous success
    last_session_reset: Mutex<Option<i64>>,
    /// Nominal (user-chosen) interval the current/next loop runs at
    nominal_interval: Mutex<Duration>,
    running: tokio::sync::Mutex<Option<RunningLoop>>,
    /// Whether a loop was active when the host went to sleep
    was_polling: AtomicBool,
}

impl FetchCoordinator {
    pub fn new(
        source: Arc<dyn UsageSource>,
        observer: Arc<dyn SystemStateObserver>,
        settings: Arc<dyn SettingsProvider>,
        engine: Arc<NotificationTriggerEngine>,
        announcer: Arc<dyn Announcer>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        let nominal = settings.refresh_interval();
        Self {
            source,
            observer,
            settings,
            engine,
            announcer,
            time,
            estimator: BurnRateEstimator::default(),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(FetchState::default()),
            history: Mutex::new(VecDeque::new()),
            last_session_reset: Mutex::new(None),
            nominal_interval: Mutex::new(nominal),
            running: tokio::sync::Mutex::new(None),
            was_polling: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Fetch path
    // ------------------------------------------------------------------

    /// Perform one fetch unless one is already in flight.
    ///
    /// Safe under concurrent invocation: overlapping calls collapse into
    /// the single active fetch and return immediately.
    pub async fn refresh_once(&self) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Fetch already in flight, skipping");
            return;
        }

        match self.source.fetch_usage().await {
            Ok(reading) => self.apply_success(reading).await,
            Err(err) => self.apply_failure(err),
        }

        self.in_flight.store(false, Ordering::Release);
    }

    async fn apply_success(&self, reading: UsageReading) {
        // Alert evaluation needs the reading that is about to be replaced
        let previous = self.state.lock().unwrap().last_reading.clone();
        self.engine.evaluate(&reading, previous.as_ref()).await;

        self.handle_session_reset(&reading);
        self.record_snapshot(&reading);
        let enriched = self.enrich(reading);

        let now = self.time.now_millis();
        {
            let mut state = self.state.lock().unwrap();
            state.previous_reading = state.last_reading.take();
            state.last_reading = Some(enriched);
            state.last_error = None;
            state.last_success_at = Some(now);
            state.consecutive_failures = 0;
        }

        self.announcer.announce(messages::REFRESH_COMPLETE);
    }

    fn apply_failure(&self, err: FetchError) {
        let retryable = err.is_retryable();
        let failures = {
            let mut state = self.state.lock().unwrap();
            state.last_error = Some(err.clone());
            if retryable {
                state.consecutive_failures += 1;
            }
            state.consecutive_failures
        };

        warn!(
            error = %err,
            retryable = %retryable,
            consecutive_failures = %failures,
            "Usage fetch failed"
        );

        self.announcer.announce(messages::REFRESH_FAILED);
    }

    /// Clear sample history when the short window rolled over to a new
    /// reset time: velocity across a reset would be nonsense.
    fn handle_session_reset(&self, reading: &UsageReading) {
        let current_reset = reading.session.resets_at;
        let mut tracked = self.last_session_reset.lock().unwrap();

        if let (Some(previous), Some(current)) = (*tracked, current_reset) {
            if current > previous {
                debug!("Session window reset detected, clearing sample history");
                self.history.lock().unwrap().clear();
            }
        }
        *tracked = current_reset;
    }

    fn record_snapshot(&self, reading: &UsageReading) {
        let snapshot = UsageSnapshot::from_reading(reading, self.time.now_millis());
        let mut history = self.history.lock().unwrap();
        history.push_front(snapshot);
        history.truncate(MAX_HISTORY_SAMPLES);
    }

    /// Attach burn rates and time-to-exhaustion to every window
    fn enrich(&self, reading: UsageReading) -> UsageReading {
        let history = self.history.lock().unwrap();

        let session_series: Vec<(f64, i64)> = history
            .iter()
            .map(|s| (s.session_utilization, s.timestamp_ms))
            .collect();
        let weekly_series: Vec<(f64, i64)> = history
            .iter()
            .map(|s| (s.weekly_utilization, s.timestamp_ms))
            .collect();

        let session = self.enrich_window(&reading.session, &session_series);
        let weekly = self.enrich_window(&reading.weekly, &weekly_series);

        let mut enriched = UsageReading {
            session,
            weekly,
            subquotas: Vec::with_capacity(reading.subquotas.len()),
            fetched_at: reading.fetched_at,
        };

        for sq in reading.subquotas {
            let series: Vec<(f64, i64)> = history
                .iter()
                .filter_map(|s| s.subquota_utilization(&sq.id).map(|u| (u, s.timestamp_ms)))
                .collect();
            let window = self.enrich_window(&sq.window, &series);
            enriched = enriched.with_subquota(sq.id, sq.label, window);
        }

        enriched
    }

    fn enrich_window(&self, window: &UsageWindow, series: &[(f64, i64)]) -> UsageWindow {
        let rate = self.estimator.estimate(series);
        let tte = self
            .estimator
            .time_to_exhaustion(window.utilization, rate.as_ref());
        window.with_velocity(rate, tte)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of the fetch state for presentation layers
    pub fn state(&self) -> FetchState {
        let mut state = self.state.lock().unwrap().clone();
        state.is_fetching = self.in_flight.load(Ordering::Acquire);
        state
    }

    /// Effective polling interval right now, usable without a running loop
    pub fn effective_interval(&self) -> PollInterval {
        let highest = self
            .state
            .lock()
            .unwrap()
            .last_reading
            .as_ref()
            .map(UsageReading::highest_utilization);

        refresh_policy::effective_interval(&PolicyInputs {
            user_interval: *self.nominal_interval.lock().unwrap(),
            power_aware_enabled: self.settings.power_aware_enabled(),
            reduce_on_battery: self.settings.reduce_on_battery(),
            system_state: self.observer.current_state(),
            on_battery: self.observer.is_on_battery(),
            highest_utilization: highest,
        })
    }

    /// Duration to wait before the next fetch, recomputed after each one
    /// so a just-observed failure or critical reading shifts the wait:
    /// - non-retryable error: the plain nominal interval, no escalation
    /// - rate limited: the server-specified delay, bypassing backoff
    /// - other errors: exponential backoff
    /// - success: whatever the policy says
    pub fn next_sleep_interval(&self) -> PollInterval {
        let (last_error, failures) = {
            let state = self.state.lock().unwrap();
            (state.last_error.clone(), state.consecutive_failures)
        };

        match last_error {
            Some(FetchError::NotAuthenticated) => {
                PollInterval::Every(*self.nominal_interval.lock().unwrap())
            }
            Some(FetchError::RateLimited { retry_after_secs }) => {
                PollInterval::Every(Duration::from_secs(retry_after_secs))
            }
            Some(_) => PollInterval::Every(backoff_delay(failures)),
            None => self.effective_interval(),
        }
    }

    /// Whether the last reading is missing or older than a minute
    pub fn is_stale(&self) -> bool {
        let Some(last_success) = self.state.lock().unwrap().last_success_at else {
            return true;
        };
        let age_secs = (self.time.now_millis() - last_success) / 1000;
        age_secs > STALE_AFTER_SECS
    }

    /// Number of retained history samples (mostly useful in tests)
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    // ------------------------------------------------------------------
    // Loop control
    // ------------------------------------------------------------------

    /// Start the polling loop at `interval`, cancelling any existing loop
    /// first. At most one loop per coordinator instance.
    pub async fn start_loop(self: &Arc<Self>, interval: Duration) {
        self.stop_loop().await;
        *self.nominal_interval.lock().unwrap() = interval;

        let (sender, token) = shutdown_channel();
        let handle = tokio::spawn(Arc::clone(self).run_loop(token));
        *self.running.lock().await = Some(RunningLoop {
            shutdown: sender,
            handle,
        });
    }

    /// Idempotent cancel; awaits the loop so no fetch starts afterwards
    pub async fn stop_loop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.shutdown.shutdown();
            let _ = running.handle.await;
        }
    }

    /// Apply a changed user interval: restart only if a loop is active
    pub async fn restart_loop(self: &Arc<Self>, interval: Duration) {
        if self.is_polling().await {
            self.start_loop(interval).await;
        } else {
            *self.nominal_interval.lock().unwrap() = interval;
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.running.lock().await.is_some()
    }

    async fn run_loop(self: Arc<Self>, mut token: ShutdownToken) {
        info!(
            interval_secs = %self.nominal_interval.lock().unwrap().as_secs(),
            "Refresh loop started"
        );

        loop {
            if token.is_shutdown() {
                break;
            }

            // While suspended, poll state cheaply instead of fetching; the
            // next iteration refreshes immediately once no longer sleeping.
            if self.effective_interval().is_suspended() {
                tokio::select! {
                    _ = sleep(SLEEP_STATE_POLL) => {},
                    _ = token.wait() => break,
                }
                continue;
            }

            self.refresh_once().await;

            // Recomputed after the fetch so a critical reading or failure
            // changes the very next wait
            let delay = match self.next_sleep_interval() {
                PollInterval::Suspended => continue,
                PollInterval::Every(delay) => delay,
            };

            tokio::select! {
                _ = sleep(delay) => {},
                _ = token.wait() => break,
            }
        }

        info!("Refresh loop stopped");
    }

    // ------------------------------------------------------------------
    // Host sleep/wake
    // ------------------------------------------------------------------

    /// Host is going to sleep: stop the loop, remembering whether it ran
    pub async fn handle_sleep(&self) {
        let was = self.is_polling().await;
        self.was_polling.store(was, Ordering::Release);
        self.stop_loop().await;
        info!(was_polling = %was, "Polling paused for host sleep");
    }

    /// Host woke up: restart the loop if it was running before sleep, and
    /// schedule one extra fetch after a short delay regardless, giving the
    /// network a moment to reattach.
    pub async fn handle_wake(self: &Arc<Self>) {
        if self.was_polling.swap(false, Ordering::AcqRel) {
            let nominal = *self.nominal_interval.lock().unwrap();
            self.start_loop(nominal).await;
        }

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            sleep(WAKE_REFRESH_DELAY).await;
            coordinator.refresh_once().await;
        });
        info!("Polling resumed after host wake");
    }
}
