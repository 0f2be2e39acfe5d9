// Port Layer - Interfaces for external collaborators

pub mod announcer;
pub mod notification_sink;
pub mod settings;
pub mod system_state;
pub mod time_provider;
pub mod usage_source;

// Re-exports
pub use announcer::Announcer;
pub use notification_sink::{NotificationSink, SinkError};
pub use settings::SettingsProvider;
pub use system_state::{SystemState, SystemStateObserver};
pub use time_provider::TimeProvider;
pub use usage_source::{FetchError, UsageSource};
