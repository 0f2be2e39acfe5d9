//! Quotawatch daemon - Main Entry Point
//! Background usage polling with adaptive intervals and desktop alerts

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use quotawatch_core::application::{FetchCoordinator, NotificationTriggerEngine};
use quotawatch_core::port::settings::SettingsProvider;
use quotawatch_core::port::time_provider::SystemTimeProvider;
use quotawatch_infra_system::{
    CommandUsageSource, FileSettings, NotifySendSink, SystemStateObserverImpl, TracingAnnouncer,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_USAGE_COMMAND: &str = "quotawatch-usage";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format =
        std::env::var("QUOTAWATCH_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("quotawatch=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Quotawatch v{} starting...", VERSION);

    // 2. Load configuration
    let settings = Arc::new(FileSettings::load()?);

    let usage_command = std::env::var("QUOTAWATCH_USAGE_COMMAND")
        .unwrap_or_else(|_| DEFAULT_USAGE_COMMAND.to_string());
    let mut command_parts = usage_command.split_whitespace().map(String::from);
    let command = command_parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("QUOTAWATCH_USAGE_COMMAND is empty"))?;
    let command_args: Vec<String> = command_parts.collect();

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let observer = Arc::new(SystemStateObserverImpl::new());
    let source = Arc::new(CommandUsageSource::new(
        command.clone(),
        command_args,
        time_provider.clone(),
    ));
    let sink = Arc::new(NotifySendSink::default());
    let announcer = Arc::new(TracingAnnouncer);

    let engine = Arc::new(NotificationTriggerEngine::new(
        sink,
        announcer.clone(),
        settings.clone(),
        time_provider.clone(),
    ));

    let coordinator = Arc::new(FetchCoordinator::new(
        source,
        observer.clone(),
        settings.clone(),
        engine,
        announcer,
        time_provider,
    ));

    // 4. Start the polling loop
    info!(command = %command, "Starting usage polling loop...");
    coordinator.start_loop(settings.refresh_interval()).await;

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown or host sleep/wake signals
    run_signal_loop(&coordinator, &observer).await?;

    info!("Shutdown signal received. Exiting gracefully...");
    coordinator.stop_loop().await;
    info!("Shutdown complete.");

    Ok(())
}

/// SIGUSR1 announces an imminent host sleep, SIGUSR2 a wake (wired up by
/// a systemd sleep hook or similar); Ctrl+C / SIGTERM exit.
#[cfg(unix)]
async fn run_signal_loop(
    coordinator: &Arc<FetchCoordinator>,
    observer: &Arc<SystemStateObserverImpl>,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sleep_signal = signal(SignalKind::user_defined1())?;
    let mut wake_signal = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sigterm.recv() => break,
            _ = sleep_signal.recv() => {
                info!("Host sleep signal received");
                observer.set_sleeping(true);
                coordinator.handle_sleep().await;
            }
            _ = wake_signal.recv() => {
                info!("Host wake signal received");
                observer.set_sleeping(false);
                coordinator.handle_wake().await;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn run_signal_loop(
    _coordinator: &Arc<FetchCoordinator>,
    _observer: &Arc<SystemStateObserverImpl>,
) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
