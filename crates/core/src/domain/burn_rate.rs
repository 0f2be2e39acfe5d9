// Burn Rate Domain Model

use serde::{Deserialize, Serialize};

/// Severity band for a burn rate, used by presentation layers for
/// color-coding and by logs for at-a-glance triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnRateLevel {
    /// < 10%/hr - sustainable pace
    Low,
    /// 10-25%/hr - moderate consumption
    Medium,
    /// 25-50%/hr - heavy usage
    High,
    /// >= 50%/hr - will exhaust quickly
    VeryHigh,
}

impl std::fmt::Display for BurnRateLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BurnRateLevel::Low => write!(f, "low"),
            BurnRateLevel::Medium => write!(f, "medium"),
            BurnRateLevel::High => write!(f, "high"),
            BurnRateLevel::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Consumption velocity in percentage points per hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRate {
    pub percent_per_hour: f64,
}

impl BurnRate {
    pub fn new(percent_per_hour: f64) -> Self {
        Self { percent_per_hour }
    }

    pub fn level(&self) -> BurnRateLevel {
        match self.percent_per_hour {
            r if r < 10.0 => BurnRateLevel::Low,
            r if r < 25.0 => BurnRateLevel::Medium,
            r if r < 50.0 => BurnRateLevel::High,
            _ => BurnRateLevel::VeryHigh,
        }
    }

    /// Display form, e.g. "15%/hr"
    pub fn display(&self) -> String {
        format!("{:.0}%/hr", self.percent_per_hour)
    }
}
