// Notification Trigger Engine
// Turns successive usage readings into alerts exactly once per threshold
// crossing, with hysteresis so a reading oscillating around a threshold
// cannot flap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::application::constants::{
    HYSTERESIS_BUFFER, RESET_DETECTION_HIGH, RESET_DETECTION_LOW,
};
use crate::domain::usage::{UsageReading, UsageWindow};
use crate::port::announcer::{messages, Announcer};
use crate::port::notification_sink::NotificationSink;
use crate::port::settings::SettingsProvider;
use crate::port::time_provider::TimeProvider;

const WARNING_TITLE: &str = "Usage Warning";
const CAPACITY_TITLE: &str = "Capacity Full";
const RESET_TITLE: &str = "Usage Reset Complete";
const RESET_IDENTIFIER: &str = "reset-complete";

/// Per-identifier firing state.
///
/// Armed -> Fired on an upward threshold crossing; Fired -> Armed only once
/// the hysteresis condition for that identifier is met. A Fired identifier
/// stays silent until re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerState {
    Armed,
    Fired,
}

/// A usage window paired with its stable identifier and display label
struct NamedWindow<'a> {
    label: &'a str,
    identifier: &'a str,
    current: &'a UsageWindow,
    previous: Option<&'a UsageWindow>,
}

/// Stateful hysteresis tracker and alert dispatcher.
///
/// Three alert kinds share one edge-trigger pattern: fire when the current
/// utilization is at or past the threshold while the previous one was
/// below it, then stay quiet until utilization falls below
/// `threshold - HYSTERESIS_BUFFER`. Reset-complete inverts the direction
/// (a drop, not a rise) and applies to the weekly window only.
///
/// Sink and announcer failures are swallowed: alert delivery is
/// best-effort and never becomes an engine error.
pub struct NotificationTriggerEngine {
    sink: Arc<dyn NotificationSink>,
    announcer: Arc<dyn Announcer>,
    settings: Arc<dyn SettingsProvider>,
    time: Arc<dyn TimeProvider>,
    triggers: Mutex<HashMap<String, TriggerState>>,
}

impl NotificationTriggerEngine {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        announcer: Arc<dyn Announcer>,
        settings: Arc<dyn SettingsProvider>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            sink,
            announcer,
            settings,
            time,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate one reading against its immediate predecessor.
    ///
    /// Called on the coordinator's serialized fetch path after every
    /// successful fetch, before the new reading replaces the old one.
    pub async fn evaluate(&self, current: &UsageReading, previous: Option<&UsageReading>) {
        if !self.settings.notifications_enabled() {
            return;
        }

        let warning_threshold = f64::from(self.settings.warning_threshold());
        let warning_enabled = self.settings.warning_enabled();
        let capacity_enabled = self.settings.capacity_full_enabled();

        for window in Self::named_windows(current, previous) {
            let current_util = window.current.utilization;
            let previous_util = window.previous.map_or(0.0, |w| w.utilization);

            if warning_enabled {
                self.check_warning(&window, current_util, previous_util, warning_threshold)
                    .await;
            }

            if capacity_enabled {
                self.check_capacity_full(&window, current_util, previous_util)
                    .await;
            }
        }

        // Reset detection deliberately inspects only the long window; the
        // short window resets too often to be worth announcing.
        if self.settings.reset_complete_enabled() {
            self.check_reset_complete(&current.weekly, previous.map(|p| &p.weekly))
                .await;
        }
    }

    /// Forget all firing state (e.g. when the account changes)
    pub fn clear(&self) {
        self.triggers.lock().unwrap().clear();
    }

    fn named_windows<'a>(
        current: &'a UsageReading,
        previous: Option<&'a UsageReading>,
    ) -> Vec<NamedWindow<'a>> {
        let mut windows = vec![
            NamedWindow {
                label: "Current session",
                identifier: "session",
                current: &current.session,
                previous: previous.map(|p| &p.session),
            },
            NamedWindow {
                label: "Weekly usage",
                identifier: "weekly",
                current: &current.weekly,
                previous: previous.map(|p| &p.weekly),
            },
        ];

        for sq in &current.subquotas {
            windows.push(NamedWindow {
                label: &sq.label,
                identifier: &sq.id,
                current: &sq.window,
                previous: previous
                    .and_then(|p| p.subquota(&sq.id))
                    .map(|prev_sq| &prev_sq.window),
            });
        }

        windows
    }

    async fn check_warning(
        &self,
        window: &NamedWindow<'_>,
        current_util: f64,
        previous_util: f64,
        threshold: f64,
    ) {
        let id = format!("usage-warning-{}", window.identifier);

        if current_util < threshold - HYSTERESIS_BUFFER {
            self.rearm(&id);
        }

        if current_util >= threshold && previous_util < threshold {
            let body = self.threshold_body(window.label, current_util, window.current.resets_at);
            self.fire(
                &id,
                WARNING_TITLE,
                &body,
                &messages::warning_threshold(current_util as i64),
            )
            .await;
        }
    }

    async fn check_capacity_full(
        &self,
        window: &NamedWindow<'_>,
        current_util: f64,
        previous_util: f64,
    ) {
        let id = format!("capacity-full-{}", window.identifier);

        if current_util < 100.0 - HYSTERESIS_BUFFER {
            self.rearm(&id);
        }

        if current_util >= 100.0 && previous_util < 100.0 {
            let body = self.capacity_body(window.label, window.current.resets_at);
            self.fire(
                &id,
                CAPACITY_TITLE,
                &body,
                &messages::capacity_full(window.label),
            )
            .await;
        }
    }

    async fn check_reset_complete(&self, current: &UsageWindow, previous: Option<&UsageWindow>) {
        // A drop can only be observed with a predecessor
        let Some(previous) = previous else { return };

        let was_high = previous.utilization > RESET_DETECTION_HIGH;
        let is_low = current.utilization < RESET_DETECTION_LOW;

        if was_high && is_low {
            self.fire(
                RESET_IDENTIFIER,
                RESET_TITLE,
                "Your weekly limit has reset. Full capacity available.",
                messages::RESET_COMPLETE,
            )
            .await;
        }

        // Re-arm once utilization climbs back out of the post-reset band,
        // so the next reset can be announced again.
        if current.utilization >= RESET_DETECTION_LOW {
            self.rearm(RESET_IDENTIFIER);
        }
    }

    /// Send one alert unless its identifier already fired since the last
    /// re-arm. De-duplication lives here, never in the sink.
    async fn fire(&self, identifier: &str, title: &str, body: &str, announcement: &str) {
        {
            let mut triggers = self.triggers.lock().unwrap();
            let state = triggers
                .entry(identifier.to_string())
                .or_insert(TriggerState::Armed);
            if *state == TriggerState::Fired {
                debug!(identifier = %identifier, "Suppressing duplicate notification");
                return;
            }
            *state = TriggerState::Fired;
        }

        info!(identifier = %identifier, title = %title, "Notification fired");

        if let Err(err) = self.sink.send(title, body, identifier).await {
            debug!(identifier = %identifier, error = %err, "Notification sink failed (ignored)");
        }
        self.announcer.announce(announcement);
    }

    fn rearm(&self, identifier: &str) {
        let mut triggers = self.triggers.lock().unwrap();
        if let Some(state) = triggers.get_mut(identifier) {
            if *state == TriggerState::Fired {
                debug!(identifier = %identifier, "Notification re-armed");
            }
            *state = TriggerState::Armed;
        }
    }

    fn threshold_body(&self, label: &str, utilization: f64, resets_at: Option<i64>) -> String {
        let mut body = format!("{} at {}%", label, utilization.round() as i64);
        if let Some(reset) = self.format_reset_time(resets_at) {
            body.push_str(". ");
            body.push_str(&reset);
        }
        body
    }

    fn capacity_body(&self, label: &str, resets_at: Option<i64>) -> String {
        let mut body = format!("{} limit reached", label);
        if let Some(reset) = self.format_reset_time(resets_at) {
            body.push_str(". ");
            body.push_str(&reset);
        }
        body
    }

    /// Humanized "Resets in ..." suffix, None when the reset time is
    /// unknown or already past
    fn format_reset_time(&self, resets_at: Option<i64>) -> Option<String> {
        let resets_at = resets_at?;
        let remaining_secs = (resets_at - self.time.now_millis()) / 1000;
        if remaining_secs <= 0 {
            return None;
        }

        let text = if remaining_secs < 60 {
            "under a minute".to_string()
        } else if remaining_secs < 3600 {
            let minutes = remaining_secs / 60;
            format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
        } else if remaining_secs < 86_400 {
            let hours = remaining_secs / 3600;
            format!("about {} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            let days = remaining_secs / 86_400;
            format!("about {} day{}", days, if days == 1 { "" } else { "s" })
        };

        Some(format!("Resets in {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::announcer::mocks::MockAnnouncer;
    use crate::port::notification_sink::mocks::MockNotificationSink;
    use crate::port::settings::mocks::{MockSettings, SettingsValues};
    use crate::port::time_provider::mocks::MockTimeProvider;

    struct Fixture {
        sink: Arc<MockNotificationSink>,
        announcer: Arc<MockAnnouncer>,
        settings: Arc<MockSettings>,
        engine: NotificationTriggerEngine,
    }

    fn fixture() -> Fixture {
        fixture_with(SettingsValues {
            warning_threshold: 50,
            ..SettingsValues::default()
        })
    }

    fn fixture_with(values: SettingsValues) -> Fixture {
        let sink = Arc::new(MockNotificationSink::new());
        let announcer = Arc::new(MockAnnouncer::new());
        let settings = Arc::new(MockSettings::new(values));
        let engine = NotificationTriggerEngine::new(
            sink.clone(),
            announcer.clone(),
            settings.clone(),
            Arc::new(MockTimeProvider::new(0)),
        );
        Fixture {
            sink,
            announcer,
            settings,
            engine,
        }
    }

    fn reading(session_util: f64, weekly_util: f64) -> UsageReading {
        UsageReading::new(
            UsageWindow::new(session_util, None),
            UsageWindow::new(weekly_util, None),
            0,
        )
    }

    /// Run a session-utilization sequence through the engine, the weekly
    /// window pinned low so only the session window can trigger.
    async fn run_session_sequence(fx: &Fixture, utils: &[f64]) {
        let mut previous: Option<UsageReading> = None;
        for &util in utils {
            let current = reading(util, 1.0);
            fx.engine.evaluate(&current, previous.as_ref()).await;
            previous = Some(current);
        }
    }

    #[tokio::test]
    async fn warning_is_edge_triggered_with_hysteresis() {
        let fx = fixture();

        // 52 crosses up (fire); 96 stays above (no edge); 88 still above;
        // 40 re-arms; the second 96 crosses up again (fire).
        run_session_sequence(&fx, &[40.0, 52.0, 96.0, 88.0, 40.0, 96.0]).await;

        let warnings: Vec<_> = fx
            .sink
            .identifiers()
            .into_iter()
            .filter(|id| id == "usage-warning-session")
            .collect();
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn warning_does_not_refire_after_shallow_dip() {
        let fx = fixture();

        // 48 is below the threshold but not below threshold - 5, so the
        // identifier stays Fired and the second crossing is suppressed.
        run_session_sequence(&fx, &[40.0, 52.0, 48.0, 52.0]).await;

        assert_eq!(fx.sink.sent_count(), 1);
    }

    #[tokio::test]
    async fn first_reading_can_fire_against_missing_previous() {
        let fx = fixture();

        // No previous reading: previous utilization counts as 0
        let current = reading(96.0, 1.0);
        fx.engine.evaluate(&current, None).await;

        assert_eq!(fx.sink.identifiers(), vec!["usage-warning-session"]);
    }

    #[tokio::test]
    async fn capacity_full_fires_at_hundred_and_rearms_below_95() {
        let fx = fixture();

        run_session_sequence(&fx, &[90.0, 100.0, 97.0, 100.0, 94.0, 100.5]).await;

        let full: Vec<_> = fx
            .sink
            .identifiers()
            .into_iter()
            .filter(|id| id == "capacity-full-session")
            .collect();
        // Fired at 100, suppressed at the second 100 (only dipped to 97),
        // fired again after dipping to 94.
        assert_eq!(full.len(), 2);
    }

    #[tokio::test]
    async fn reset_complete_fires_once_per_drop() {
        let fx = fixture();

        let mut previous: Option<UsageReading> = None;
        for weekly in [10.0, 60.0, 70.0, 5.0] {
            let current = reading(1.0, weekly);
            fx.engine.evaluate(&current, previous.as_ref()).await;
            previous = Some(current);
        }

        let resets: Vec<_> = fx
            .sink
            .identifiers()
            .into_iter()
            .filter(|id| id == RESET_IDENTIFIER)
            .collect();
        assert_eq!(resets.len(), 1);
    }

    #[tokio::test]
    async fn reset_complete_ignores_session_window_drops() {
        let fx = fixture();

        // The session window drops sharply; the weekly window never does.
        run_session_sequence(&fx, &[10.0, 60.0, 70.0, 5.0]).await;

        assert!(!fx
            .sink
            .identifiers()
            .iter()
            .any(|id| id == RESET_IDENTIFIER));
    }

    #[tokio::test]
    async fn reset_complete_rearms_when_usage_climbs_back() {
        let fx = fixture();

        let mut previous: Option<UsageReading> = None;
        for weekly in [60.0, 5.0, 8.0, 60.0, 4.0] {
            let current = reading(1.0, weekly);
            fx.engine.evaluate(&current, previous.as_ref()).await;
            previous = Some(current);
        }

        let resets: Vec<_> = fx
            .sink
            .identifiers()
            .into_iter()
            .filter(|id| id == RESET_IDENTIFIER)
            .collect();
        // Fired at 60->5, stayed quiet at 8 (no re-arm below 10), re-armed
        // at 60, fired again at 60->4.
        assert_eq!(resets.len(), 2);
    }

    #[tokio::test]
    async fn master_toggle_suppresses_everything() {
        let fx = fixture();
        fx.settings.update(|v| v.notifications_enabled = false);

        run_session_sequence(&fx, &[40.0, 96.0, 100.0]).await;

        assert_eq!(fx.sink.sent_count(), 0);
        assert!(fx.announcer.messages().is_empty());
    }

    #[tokio::test]
    async fn per_kind_toggles_gate_independently() {
        let fx = fixture();
        fx.settings.update(|v| v.warning_enabled = false);

        run_session_sequence(&fx, &[40.0, 96.0, 100.0]).await;

        // Warning suppressed, capacity-full still fires
        assert_eq!(fx.sink.identifiers(), vec!["capacity-full-session"]);
    }

    #[tokio::test]
    async fn subquota_windows_alert_independently() {
        let fx = fixture();

        let first = reading(1.0, 1.0).with_subquota(
            "opus",
            "Weekly (Opus)",
            UsageWindow::new(40.0, None),
        );
        let second = reading(1.0, 1.0).with_subquota(
            "opus",
            "Weekly (Opus)",
            UsageWindow::new(63.0, None),
        );

        fx.engine.evaluate(&first, None).await;
        fx.engine.evaluate(&second, Some(&first)).await;

        assert_eq!(fx.sink.identifiers(), vec!["usage-warning-opus"]);
        let sent = fx.sink.sent();
        assert!(sent[0].body.starts_with("Weekly (Opus) at 63%"));
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed_but_state_still_advances() {
        let fx = fixture();
        fx.sink.set_failing(true);

        run_session_sequence(&fx, &[40.0, 96.0]).await;

        // Nothing delivered, no panic, and the announcement still went out
        assert_eq!(fx.sink.sent_count(), 0);
        assert_eq!(fx.announcer.messages(), vec!["Warning: usage at 96 percent"]);
    }

    #[tokio::test]
    async fn body_includes_humanized_reset_time() {
        let sink = Arc::new(MockNotificationSink::new());
        let time = Arc::new(MockTimeProvider::new(0));
        let engine = NotificationTriggerEngine::new(
            sink.clone(),
            Arc::new(MockAnnouncer::new()),
            Arc::new(MockSettings::new(SettingsValues {
                warning_threshold: 50,
                ..SettingsValues::default()
            })),
            time.clone(),
        );

        // Resets two hours from "now"
        let two_hours_ms = 2 * 3600 * 1000;
        let current = UsageReading::new(
            UsageWindow::new(70.0, Some(two_hours_ms)),
            UsageWindow::new(1.0, None),
            0,
        );
        engine.evaluate(&current, None).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Current session at 70%. Resets in about 2 hours");
    }

    #[tokio::test]
    async fn clear_forgets_fired_state() {
        let fx = fixture();

        run_session_sequence(&fx, &[40.0, 96.0]).await;
        fx.engine.clear();

        // Without clear() this crossing would be suppressed (no re-arm dip)
        let previous = reading(96.0, 1.0);
        let current = reading(97.0, 1.0);
        // previous_util 96 >= threshold, so no edge; go below first
        let dip = reading(49.0, 1.0);
        fx.engine.evaluate(&dip, Some(&previous)).await;
        fx.engine.evaluate(&current, Some(&dip)).await;

        let warnings: Vec<_> = fx
            .sink
            .identifiers()
            .into_iter()
            .filter(|id| id == "usage-warning-session")
            .collect();
        assert_eq!(warnings.len(), 2);
    }
}
