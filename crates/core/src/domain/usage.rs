// Usage Reading Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::burn_rate::BurnRate;

/// Stable identifier for a usage window ("session", "weekly", subquota ids)
pub type WindowId = String;

/// One quota scope: utilization percentage plus optional reset time and
/// derived velocity metrics.
///
/// Utilization is NOT clamped by the core. Values above 100 are valid and
/// mean the quota is exhausted (the remote side may over-report briefly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage of the quota consumed (0.0 - 100.0+)
    pub utilization: f64,

    /// When this window resets, epoch milliseconds (None if unknown)
    pub resets_at: Option<i64>,

    /// Derived consumption velocity (None until enough history exists)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_rate: Option<BurnRate>,

    /// Derived seconds until the quota is exhausted at the current rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_exhaustion_secs: Option<i64>,
}

impl UsageWindow {
    pub fn new(utilization: f64, resets_at: Option<i64>) -> Self {
        Self {
            utilization,
            resets_at,
            burn_rate: None,
            time_to_exhaustion_secs: None,
        }
    }

    /// Any value at or above 100 counts as exhausted
    pub fn is_at_capacity(&self) -> bool {
        self.utilization >= 100.0
    }

    /// Copy of this window with velocity metrics attached
    pub fn with_velocity(
        &self,
        burn_rate: Option<BurnRate>,
        time_to_exhaustion_secs: Option<i64>,
    ) -> Self {
        Self {
            utilization: self.utilization,
            resets_at: self.resets_at,
            burn_rate,
            time_to_exhaustion_secs,
        }
    }
}

/// An optional per-model (or otherwise scoped) sub-quota within a reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquota {
    /// Stable identifier used in notification de-duplication keys
    pub id: WindowId,
    /// Human-readable label used in notification bodies
    pub label: String,
    pub window: UsageWindow,
}

/// One atomically-produced usage reading across all quota windows.
///
/// Immutable once produced. Consumers only ever compare a reading against
/// the immediately preceding one, never an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReading {
    /// Short rolling window (the current session quota)
    pub session: UsageWindow,

    /// Long window (the weekly quota across all models)
    pub weekly: UsageWindow,

    /// Optional sub-quotas, e.g. per-model weekly limits
    pub subquotas: Vec<Subquota>,

    /// When this reading was fetched, epoch milliseconds
    pub fetched_at: i64,
}

impl UsageReading {
    pub fn new(session: UsageWindow, weekly: UsageWindow, fetched_at: i64) -> Self {
        Self {
            session,
            weekly,
            subquotas: Vec::new(),
            fetched_at,
        }
    }

    pub fn with_subquota(mut self, id: impl Into<String>, label: impl Into<String>, window: UsageWindow) -> Self {
        self.subquotas.push(Subquota {
            id: id.into(),
            label: label.into(),
            window,
        });
        self
    }

    /// Highest utilization across all windows (drives the critical-usage
    /// branch of the refresh policy)
    pub fn highest_utilization(&self) -> f64 {
        let mut highest = self.session.utilization.max(self.weekly.utilization);
        for sq in &self.subquotas {
            highest = highest.max(sq.window.utilization);
        }
        highest
    }

    /// Highest burn rate across all windows, None if no window has one
    pub fn highest_burn_rate(&self) -> Option<BurnRate> {
        let mut best: Option<BurnRate> = None;
        let rates = self
            .session
            .burn_rate
            .iter()
            .chain(self.weekly.burn_rate.iter())
            .chain(self.subquotas.iter().filter_map(|sq| sq.window.burn_rate.as_ref()));
        for rate in rates {
            match &best {
                Some(b) if b.percent_per_hour >= rate.percent_per_hour => {}
                _ => best = Some(rate.clone()),
            }
        }
        best
    }

    /// Look up a sub-quota window by its stable id
    pub fn subquota(&self, id: &str) -> Option<&Subquota> {
        self.subquotas.iter().find(|sq| sq.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_utilization_covers_subquotas() {
        let reading = UsageReading::new(
            UsageWindow::new(40.0, None),
            UsageWindow::new(55.0, None),
            0,
        )
        .with_subquota("opus", "Weekly (Opus)", UsageWindow::new(72.5, None));

        assert_eq!(reading.highest_utilization(), 72.5);
    }

    #[test]
    fn at_capacity_is_not_clamped() {
        let window = UsageWindow::new(104.2, None);
        assert!(window.is_at_capacity());
        assert_eq!(window.utilization, 104.2);
    }

    #[test]
    fn highest_burn_rate_picks_maximum() {
        let mut session = UsageWindow::new(10.0, None);
        session.burn_rate = Some(BurnRate::new(12.0));
        let mut weekly = UsageWindow::new(20.0, None);
        weekly.burn_rate = Some(BurnRate::new(31.0));

        let reading = UsageReading::new(session, weekly, 0);
        assert_eq!(reading.highest_burn_rate().unwrap().percent_per_hour, 31.0);
    }
}
