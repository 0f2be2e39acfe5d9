// Quotawatch System Adapters
// Implementations of the core ports against the host system: activity and
// power observation, the usage-command data source, desktop notifications,
// and file/env-backed settings.

mod command_source;
mod notify_sink;
mod settings;
mod system_observer;

pub use command_source::CommandUsageSource;
pub use notify_sink::{NotifySendSink, TracingAnnouncer};
pub use settings::FileSettings;
pub use system_observer::SystemStateObserverImpl;
