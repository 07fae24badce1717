//! Health score model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a metric across the available snapshot history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Default for Trend {
    fn default() -> Self {
        Self::Stable
    }
}

/// Per-metric trends, oldest vs newest snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HealthTrends {
    pub open_rate: Trend,
    pub bounce_rate: Trend,
    pub complaint_rate: Trend,
}

/// Derived 0-100 campaign health, recomputed from snapshots on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignHealthScore {
    pub campaign_id: Uuid,
    /// Weighted blend of the sub-scores; reputation weighs heaviest.
    pub overall: f64,
    pub deliverability: f64,
    pub engagement: f64,
    pub reputation: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub trends: HealthTrends,
    pub generated_at: DateTime<Utc>,
}
