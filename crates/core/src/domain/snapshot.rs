// Usage Snapshot - sample-window element for the burn-rate estimator

use crate::domain::usage::{UsageReading, WindowId};

/// A point-in-time capture of the utilization of every window in a reading.
///
/// The fetch coordinator retains a bounded, newest-first history of these;
/// the estimator reads only the first and last elements of each series.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub session_utilization: f64,
    pub weekly_utilization: f64,
    /// (subquota id, utilization) pairs for whatever sub-quotas the
    /// reading carried at capture time
    pub subquotas: Vec<(WindowId, f64)>,
    /// When this snapshot was taken, epoch milliseconds
    pub timestamp_ms: i64,
}

impl UsageSnapshot {
    pub fn from_reading(reading: &UsageReading, timestamp_ms: i64) -> Self {
        Self {
            session_utilization: reading.session.utilization,
            weekly_utilization: reading.weekly.utilization,
            subquotas: reading
                .subquotas
                .iter()
                .map(|sq| (sq.id.clone(), sq.window.utilization))
                .collect(),
            timestamp_ms,
        }
    }

    /// Utilization of one sub-quota in this snapshot, if it was present
    pub fn subquota_utilization(&self, id: &str) -> Option<f64> {
        self.subquotas
            .iter()
            .find(|(sq_id, _)| sq_id == id)
            .map(|(_, util)| *util)
    }
}
