// Burn Rate Estimator
// Pure computation over a short (utilization, timestamp) sample window.

use crate::domain::burn_rate::BurnRate;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const SECS_PER_HOUR: f64 = 3600.0;

/// Estimates consumption velocity from a newest-first sample window.
///
/// Only the first and last samples matter; the caller retains a bounded
/// trailing history and hands it over on each estimate.
#[derive(Debug, Clone)]
pub struct BurnRateEstimator {
    min_samples: usize,
}

impl Default for BurnRateEstimator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl BurnRateEstimator {
    /// `min_samples` below 2 is meaningless and raised to 2
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(2),
        }
    }

    /// Estimate the burn rate from `(utilization, timestamp_ms)` samples,
    /// newest first.
    ///
    /// Returns None when:
    /// - fewer than `min_samples` samples exist
    /// - elapsed time between oldest and newest is zero or negative
    /// - utilization decreased (a quota reset, not consumption; a negative
    ///   rate here would be misleading)
    pub fn estimate(&self, samples: &[(f64, i64)]) -> Option<BurnRate> {
        if samples.len() < self.min_samples {
            return None;
        }

        let (newest_util, newest_ts) = samples[0];
        let (oldest_util, oldest_ts) = samples[samples.len() - 1];

        let elapsed_hours = (newest_ts - oldest_ts) as f64 / MILLIS_PER_HOUR;
        if elapsed_hours <= 0.0 {
            return None;
        }

        let consumed = newest_util - oldest_util;
        if consumed <= 0.0 {
            return None;
        }

        Some(BurnRate::new(consumed / elapsed_hours))
    }

    /// Seconds until 100% utilization at the given rate.
    ///
    /// Returns None if the rate is absent or non-positive, 0 if already at
    /// or above capacity.
    pub fn time_to_exhaustion(&self, current_utilization: f64, rate: Option<&BurnRate>) -> Option<i64> {
        let rate = rate?;
        if rate.percent_per_hour <= 0.0 {
            return None;
        }
        if current_utilization >= 100.0 {
            return Some(0);
        }

        let remaining = 100.0 - current_utilization;
        let hours = remaining / rate.percent_per_hour;
        Some((hours * SECS_PER_HOUR).round() as i64)
    }
}
