use serde::{Deserialize, Serialize};
use strum::Display;

/// Discrete risk band derived from a clamped score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    #[strum(serialize = "Very High")]
    VeryHigh,
    Extreme,
}

impl RiskCategory {
    /// All categories from lowest to highest.
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Low,
        RiskCategory::Moderate,
        RiskCategory::High,
        RiskCategory::VeryHigh,
        RiskCategory::Extreme,
    ];

    /// Half-open bands: [0,20) [20,40) [40,60) [60,80) [80,100].
    /// Callers clamp to [0,100] first.
    pub fn categorize(score: f64) -> Self {
        if score < 20.0 {
            RiskCategory::Low
        } else if score < 40.0 {
            RiskCategory::Moderate
        } else if score < 60.0 {
            RiskCategory::High
        } else if score < 80.0 {
            RiskCategory::VeryHigh
        } else {
            RiskCategory::Extreme
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Moderate => "Moderate",
            RiskCategory::High => "High",
            RiskCategory::VeryHigh => "Very High",
            RiskCategory::Extreme => "Extreme",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.label()).collect()
    }
}
