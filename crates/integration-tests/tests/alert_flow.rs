//! End-to-end alert flow
//!
//! Feeds scripted readings through the full fetch path (coordinator ->
//! trigger engine -> sink/announcer) and checks what the user would see.

use std::sync::Arc;

use quotawatch_core::application::{FetchCoordinator, NotificationTriggerEngine};
use quotawatch_core::domain::{UsageReading, UsageWindow};
use quotawatch_core::port::announcer::mocks::MockAnnouncer;
use quotawatch_core::port::notification_sink::mocks::MockNotificationSink;
use quotawatch_core::port::settings::mocks::{MockSettings, SettingsValues};
use quotawatch_core::port::system_state::mocks::MockSystemStateObserver;
use quotawatch_core::port::time_provider::mocks::MockTimeProvider;
use quotawatch_core::port::usage_source::mocks::MockUsageSource;

const HOUR_MS: i64 = 3_600_000;

struct Harness {
    source: Arc<MockUsageSource>,
    sink: Arc<MockNotificationSink>,
    announcer: Arc<MockAnnouncer>,
    time: Arc<MockTimeProvider>,
    coordinator: Arc<FetchCoordinator>,
}

fn weekly_reading(weekly_util: f64) -> UsageReading {
    UsageReading::new(
        UsageWindow::new(1.0, None),
        UsageWindow::new(weekly_util, None),
        0,
    )
}

fn harness() -> Harness {
    let source = Arc::new(MockUsageSource::always(Ok(weekly_reading(1.0))));
    let sink = Arc::new(MockNotificationSink::new());
    let announcer = Arc::new(MockAnnouncer::new());
    let settings = Arc::new(MockSettings::new(SettingsValues::default()));
    let time = Arc::new(MockTimeProvider::new(0));
    let engine = Arc::new(NotificationTriggerEngine::new(
        sink.clone(),
        announcer.clone(),
        settings.clone(),
        time.clone(),
    ));
    let coordinator = Arc::new(FetchCoordinator::new(
        source.clone(),
        Arc::new(MockSystemStateObserver::active_on_ac()),
        settings,
        engine,
        announcer.clone(),
        time.clone(),
    ));
    Harness {
        source,
        sink,
        announcer,
        time,
        coordinator,
    }
}

fn count_of(ids: &[String], wanted: &str) -> usize {
    ids.iter().filter(|id| *id == wanted).count()
}

#[tokio::test]
async fn threshold_crossing_reaches_the_desktop_exactly_once() {
    let h = harness();

    for weekly in [40.0, 85.0, 90.0] {
        h.source.push(Ok(weekly_reading(weekly)));
        h.coordinator.refresh_once().await;
    }

    // Default threshold 80: only the 40 -> 85 crossing is an edge
    let ids = h.sink.identifiers();
    assert_eq!(count_of(&ids, "usage-warning-weekly"), 1);

    let sent = h.sink.sent();
    assert_eq!(sent[0].title, "Usage Warning");
    assert!(sent[0].body.starts_with("Weekly usage at 85%"));

    // The announcer heard the refresh and the warning
    let messages = h.announcer.messages();
    assert!(messages.contains(&"Warning: usage at 85 percent".to_string()));
    assert!(messages.contains(&"Usage data updated".to_string()));
}

#[tokio::test]
async fn a_full_week_cycle_fires_each_alert_kind_once() {
    let h = harness();

    for weekly in [95.0, 100.0, 100.0, 3.0, 60.0] {
        h.source.push(Ok(weekly_reading(weekly)));
        h.coordinator.refresh_once().await;
    }

    let ids = h.sink.identifiers();
    // 95 crosses the warning threshold (previous reading absent counts
    // as zero), 100 exhausts the window, 100 -> 3 is the weekly reset
    assert_eq!(count_of(&ids, "usage-warning-weekly"), 1);
    assert_eq!(count_of(&ids, "capacity-full-weekly"), 1);
    assert_eq!(count_of(&ids, "reset-complete"), 1);
}

#[tokio::test]
async fn disabled_notifications_still_refresh_quietly() {
    let source = Arc::new(MockUsageSource::always(Ok(weekly_reading(99.0))));
    let sink = Arc::new(MockNotificationSink::new());
    let settings = Arc::new(MockSettings::new(SettingsValues {
        notifications_enabled: false,
        ..SettingsValues::default()
    }));
    let time = Arc::new(MockTimeProvider::new(0));
    let engine = Arc::new(NotificationTriggerEngine::new(
        sink.clone(),
        Arc::new(MockAnnouncer::new()),
        settings.clone(),
        time.clone(),
    ));
    let coordinator = Arc::new(FetchCoordinator::new(
        source,
        Arc::new(MockSystemStateObserver::active_on_ac()),
        settings,
        engine,
        Arc::new(MockAnnouncer::new()),
        time,
    ));

    coordinator.refresh_once().await;

    assert_eq!(sink.sent_count(), 0);
    assert!(coordinator.state().last_reading.is_some());
}

#[tokio::test]
async fn burn_rate_and_exhaustion_reach_the_reading() {
    let h = harness();

    h.source.push(Ok(UsageReading::new(
        UsageWindow::new(20.0, None),
        UsageWindow::new(1.0, None),
        0,
    )));
    h.coordinator.refresh_once().await;

    h.time.advance(HOUR_MS);
    h.source.push(Ok(UsageReading::new(
        UsageWindow::new(30.0, None),
        UsageWindow::new(1.0, None),
        0,
    )));
    h.coordinator.refresh_once().await;

    let last = h.coordinator.state().last_reading.unwrap();
    let rate = last.session.burn_rate.unwrap();
    assert!((rate.percent_per_hour - 10.0).abs() < 1e-9);
    // 70 points of headroom at 10%/hr
    assert_eq!(last.session.time_to_exhaustion_secs, Some(25_200));
}
