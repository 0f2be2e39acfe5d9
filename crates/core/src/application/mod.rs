// Application Layer - Polling, alerting, and velocity logic

pub mod burn_rate;
pub mod constants;
pub mod coordinator;
pub mod notifier;
pub mod refresh_policy;

// Re-exports
pub use burn_rate::BurnRateEstimator;
pub use coordinator::{shutdown_channel, FetchCoordinator, FetchState, ShutdownSender, ShutdownToken};
pub use notifier::NotificationTriggerEngine;
pub use refresh_policy::{effective_interval, PolicyInputs, PollInterval};
