// Application constants (no magic values in the logic itself)
use std::time::Duration;

/// Utilization at which monitoring becomes critical and overrides battery
/// conservation (percent). Fixed upstream, deliberately not a setting.
pub const CRITICAL_USAGE_THRESHOLD: f64 = 90.0;

/// Polling interval while usage is critical (2 minutes)
pub const CRITICAL_INTERVAL: Duration = Duration::from_secs(120);

/// Cap on the stretched interval while idle or on battery (30 minutes)
pub const MAX_IDLE_INTERVAL: Duration = Duration::from_secs(1800);

/// How often the loop re-checks system state while polling is suspended
pub const SLEEP_STATE_POLL: Duration = Duration::from_secs(60);

/// Delay before the post-wake refresh, allowing network reattachment
pub const WAKE_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// Base retry delay for exponential backoff (1 minute)
pub const BACKOFF_BASE_SECS: u64 = 60;

/// Cap on the backoff delay (15 minutes)
pub const BACKOFF_MAX_SECS: u64 = 900;

/// Cap on the backoff exponent (60 * 2^4 = 960s, already above the cap)
pub const BACKOFF_MAX_EXPONENT: u32 = 4;

/// Percentage gap below a threshold required before a fired notification
/// re-arms. Fixed upstream, deliberately not a setting.
pub const HYSTERESIS_BUFFER: f64 = 5.0;

/// Reset detection: previous long-window utilization must exceed this
pub const RESET_DETECTION_HIGH: f64 = 50.0;

/// Reset detection: current long-window utilization must be below this
pub const RESET_DETECTION_LOW: f64 = 10.0;

/// Bounded trailing history for the burn-rate estimator.
/// 12 samples at the default 5-minute interval spans one hour.
pub const MAX_HISTORY_SAMPLES: usize = 12;

/// Data older than this counts as stale (seconds)
pub const STALE_AFTER_SECS: i64 = 60;
