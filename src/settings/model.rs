//! Adaptive-sending settings model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metric the adaptive policy optimizes toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    OpenRate,
    ClickRate,
    DeliveryRate,
}

impl Default for TargetMetric {
    fn default() -> Self {
        Self::OpenRate
    }
}

impl std::fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenRate => write!(f, "open_rate"),
            Self::ClickRate => write!(f, "click_rate"),
            Self::DeliveryRate => write!(f, "delivery_rate"),
        }
    }
}

impl std::str::FromStr for TargetMetric {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_rate" => Ok(Self::OpenRate),
            "click_rate" => Ok(Self::ClickRate),
            "delivery_rate" => Ok(Self::DeliveryRate),
            _ => Err(format!("Unknown target metric: {}", s)),
        }
    }
}

/// Per-campaign adaptive-sending configuration.
///
/// Created lazily with the defaults below on first read. The current
/// throttle rate is mutated only by the throttle controller; everything
/// else changes through operator saves. Rows are upserted, never deleted.
///
/// Invariant: `min_throttle_rate <= current_throttle_rate <= max_throttle_rate`
/// after every adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignAiSettings {
    pub campaign_id: Uuid,
    pub smart_sending_enabled: bool,
    pub throttle_optimization_enabled: bool,
    pub send_time_optimization_enabled: bool,
    pub ab_auto_winner_enabled: bool,
    pub target_metric: TargetMetric,
    /// Floor for the daily send rate.
    pub min_throttle_rate: i64,
    /// Ceiling for the daily send rate.
    pub max_throttle_rate: i64,
    /// Current permitted sends per day.
    pub current_throttle_rate: i64,
    /// Days of conservative ramp-up for a fresh campaign.
    pub learning_period_days: u32,
    /// A/B winner confidence threshold — consumed by an external statistics job.
    pub ab_confidence_threshold: f64,
    /// A/B minimum sample size — consumed by an external statistics job.
    pub ab_min_sample_size: i64,
    /// Complaint rate above which the policy throttles down or pauses.
    pub complaint_rate_threshold: f64,
    /// Bounce rate above which the policy throttles down.
    pub bounce_rate_threshold: f64,
    /// Allow the anomaly monitor to auto-pause on sustained complaints.
    pub pause_on_high_complaints: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignAiSettings {
    /// Deterministic defaults used when no row exists for a campaign.
    pub fn defaults_for(campaign_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            campaign_id,
            smart_sending_enabled: true,
            throttle_optimization_enabled: true,
            send_time_optimization_enabled: true,
            ab_auto_winner_enabled: false,
            target_metric: TargetMetric::OpenRate,
            min_throttle_rate: 1_000,
            max_throttle_rate: 100_000,
            current_throttle_rate: 10_000,
            learning_period_days: 7,
            ab_confidence_threshold: 0.95,
            ab_min_sample_size: 1_000,
            complaint_rate_threshold: 0.001,
            bounce_rate_threshold: 0.05,
            pause_on_high_complaints: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clamp a proposed rate into `[min_throttle_rate, max_throttle_rate]`.
    pub fn clamp_rate(&self, rate: i64) -> i64 {
        rate.clamp(self.min_throttle_rate, self.max_throttle_rate)
    }

    /// Merge an operator update onto this settings row.
    ///
    /// Only fields present in the update change; `updated_at` is stamped.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.smart_sending_enabled {
            self.smart_sending_enabled = v;
        }
        if let Some(v) = update.throttle_optimization_enabled {
            self.throttle_optimization_enabled = v;
        }
        if let Some(v) = update.send_time_optimization_enabled {
            self.send_time_optimization_enabled = v;
        }
        if let Some(v) = update.ab_auto_winner_enabled {
            self.ab_auto_winner_enabled = v;
        }
        if let Some(v) = update.target_metric {
            self.target_metric = v;
        }
        if let Some(v) = update.min_throttle_rate {
            self.min_throttle_rate = v;
        }
        if let Some(v) = update.max_throttle_rate {
            self.max_throttle_rate = v;
        }
        if let Some(v) = update.current_throttle_rate {
            self.current_throttle_rate = v;
        }
        if let Some(v) = update.learning_period_days {
            self.learning_period_days = v;
        }
        if let Some(v) = update.ab_confidence_threshold {
            self.ab_confidence_threshold = v;
        }
        if let Some(v) = update.ab_min_sample_size {
            self.ab_min_sample_size = v;
        }
        if let Some(v) = update.complaint_rate_threshold {
            self.complaint_rate_threshold = v;
        }
        if let Some(v) = update.bounce_rate_threshold {
            self.bounce_rate_threshold = v;
        }
        if let Some(v) = update.pause_on_high_complaints {
            self.pause_on_high_complaints = v;
        }
        // Keep the rate invariant after any bound change
        self.current_throttle_rate = self.clamp_rate(self.current_throttle_rate);
        self.updated_at = Utc::now();
    }
}

/// Partial operator update — every field optional, merged onto
/// existing-or-default settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub smart_sending_enabled: Option<bool>,
    pub throttle_optimization_enabled: Option<bool>,
    pub send_time_optimization_enabled: Option<bool>,
    pub ab_auto_winner_enabled: Option<bool>,
    pub target_metric: Option<TargetMetric>,
    pub min_throttle_rate: Option<i64>,
    pub max_throttle_rate: Option<i64>,
    pub current_throttle_rate: Option<i64>,
    pub learning_period_days: Option<u32>,
    pub ab_confidence_threshold: Option<f64>,
    pub ab_min_sample_size: Option<i64>,
    pub complaint_rate_threshold: Option<f64>,
    pub bounce_rate_threshold: Option<f64>,
    pub pause_on_high_complaints: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_rate_invariant() {
        let s = CampaignAiSettings::defaults_for(Uuid::new_v4());
        assert!(s.min_throttle_rate <= s.current_throttle_rate);
        assert!(s.current_throttle_rate <= s.max_throttle_rate);
    }

    #[test]
    fn merge_applies_only_present_fields() {
        let mut s = CampaignAiSettings::defaults_for(Uuid::new_v4());
        let before_max = s.max_throttle_rate;

        s.merge(&SettingsUpdate {
            complaint_rate_threshold: Some(0.002),
            throttle_optimization_enabled: Some(false),
            ..Default::default()
        });

        assert_eq!(s.complaint_rate_threshold, 0.002);
        assert!(!s.throttle_optimization_enabled);
        assert_eq!(s.max_throttle_rate, before_max);
    }

    #[test]
    fn merge_reclamps_current_rate_when_bounds_tighten() {
        let mut s = CampaignAiSettings::defaults_for(Uuid::new_v4());
        s.current_throttle_rate = 50_000;

        s.merge(&SettingsUpdate {
            max_throttle_rate: Some(20_000),
            ..Default::default()
        });

        assert_eq!(s.current_throttle_rate, 20_000);
    }

    #[test]
    fn clamp_rate_bounds() {
        let s = CampaignAiSettings::defaults_for(Uuid::new_v4());
        assert_eq!(s.clamp_rate(500), s.min_throttle_rate);
        assert_eq!(s.clamp_rate(500_000), s.max_throttle_rate);
        assert_eq!(s.clamp_rate(42_000), 42_000);
    }

    #[test]
    fn target_metric_display_and_fromstr() {
        assert_eq!(TargetMetric::ClickRate.to_string(), "click_rate");
        assert_eq!(
            "open_rate".parse::<TargetMetric>().unwrap(),
            TargetMetric::OpenRate
        );
        assert!("revenue".parse::<TargetMetric>().is_err());
    }
}
