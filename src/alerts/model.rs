//! Alert and decision-log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of automated decision recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ThrottleIncrease,
    ThrottleDecrease,
    ThrottleMaintain,
    CampaignPause,
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThrottleIncrease => write!(f, "throttle_increase"),
            Self::ThrottleDecrease => write!(f, "throttle_decrease"),
            Self::ThrottleMaintain => write!(f, "throttle_maintain"),
            Self::CampaignPause => write!(f, "campaign_pause"),
        }
    }
}

impl std::str::FromStr for DecisionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throttle_increase" => Ok(Self::ThrottleIncrease),
            "throttle_decrease" => Ok(Self::ThrottleDecrease),
            "throttle_maintain" => Ok(Self::ThrottleMaintain),
            "campaign_pause" => Ok(Self::CampaignPause),
            _ => Err(format!("Unknown decision type: {}", s)),
        }
    }
}

/// Immutable audit record of one automated action.
///
/// The revert fields exist for the operator tooling that undoes a decision;
/// nothing in this core ever sets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub decision_type: DecisionType,
    pub reason: String,
    /// Rate (or status ordinal) before the action.
    pub old_value: i64,
    /// Rate after the action; 0 for a pause.
    pub new_value: i64,
    /// Window totals the decision was based on, as JSON.
    pub metrics: serde_json::Value,
    pub confidence: f64,
    /// Whether the action actually mutated state (a lost rate race records
    /// the decision with `applied = false`).
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub reverted: bool,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AiDecision {
    pub fn new(
        campaign_id: Uuid,
        decision_type: DecisionType,
        reason: impl Into<String>,
        old_value: i64,
        new_value: i64,
        metrics: serde_json::Value,
        confidence: f64,
        applied: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            decision_type,
            reason: reason.into(),
            old_value,
            new_value,
            metrics,
            confidence,
            applied,
            applied_at: applied.then_some(now),
            reverted: false,
            reverted_at: None,
            reverted_by: None,
            created_at: now,
        }
    }
}

/// Kind of operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighComplaintRate,
    HighBounceRate,
    LowEngagement,
    CampaignPaused,
    ThrottleAdjusted,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighComplaintRate => write!(f, "high_complaint_rate"),
            Self::HighBounceRate => write!(f, "high_bounce_rate"),
            Self::LowEngagement => write!(f, "low_engagement"),
            Self::CampaignPaused => write!(f, "campaign_paused"),
            Self::ThrottleAdjusted => write!(f, "throttle_adjusted"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_complaint_rate" => Ok(Self::HighComplaintRate),
            "high_bounce_rate" => Ok(Self::HighBounceRate),
            "low_engagement" => Ok(Self::LowEngagement),
            "campaign_paused" => Ok(Self::CampaignPaused),
            "throttle_adjusted" => Ok(Self::ThrottleAdjusted),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

/// Alert severity, ordered least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown alert severity: {}", s)),
        }
    }
}

/// Operator-facing notification. Append-only; acknowledgment is set exactly
/// once and repeat acknowledgment is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignAlert {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    /// Threshold that was crossed.
    pub threshold_value: f64,
    /// Observed value that crossed it.
    pub actual_value: f64,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CampaignAlert {
    pub fn new(
        campaign_id: Uuid,
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        threshold_value: f64,
        actual_value: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            threshold_value,
            actual_value,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            created_at: Utc::now(),
        }
    }
}
