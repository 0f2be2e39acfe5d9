// Domain Layer - Pure value types, no behavior beyond derived accessors

pub mod burn_rate;
pub mod snapshot;
pub mod usage;

// Re-exports
pub use burn_rate::{BurnRate, BurnRateLevel};
pub use snapshot::UsageSnapshot;
pub use usage::{Subquota, UsageReading, UsageWindow, WindowId};
