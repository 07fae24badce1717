//! Throttle recommendation model.

use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::metrics::model::rate;

/// Action the policy recommends for a campaign's send rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleAction {
    Increase,
    Decrease,
    Maintain,
    Pause,
}

impl std::fmt::Display for ThrottleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increase => write!(f, "increase"),
            Self::Decrease => write!(f, "decrease"),
            Self::Maintain => write!(f, "maintain"),
            Self::Pause => write!(f, "pause"),
        }
    }
}

/// Reputation risk attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Transient output of one decision cycle.
///
/// `new_rate` is the raw policy proposal; the apply path clamps it into the
/// campaign's configured bounds before persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleRecommendation {
    pub action: ThrottleAction,
    pub new_rate: i64,
    pub reason: String,
    /// Policy confidence in this action, in [0, 1].
    pub confidence: f64,
    pub risk: RiskLevel,
    pub expected_impact: String,
}

/// Interval counts summed across an analysis window, with derived rates.
///
/// Summing counts before dividing avoids the small-sample bias of averaging
/// per-snapshot rates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WindowTotals {
    pub snapshots: usize,
    pub sent: i64,
    pub delivered: i64,
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub complained: i64,
    pub open_rate: f64,
    pub bounce_rate: f64,
    pub complaint_rate: f64,
}

impl WindowTotals {
    /// Sum per-interval counts across the window and derive rates.
    pub fn from_snapshots(snapshots: &[MetricsSnapshot]) -> Self {
        let mut totals = Self {
            snapshots: snapshots.len(),
            ..Self::default()
        };
        for s in snapshots {
            totals.sent += s.sent;
            totals.delivered += s.delivered;
            totals.opened += s.opened;
            totals.clicked += s.clicked;
            totals.bounced += s.bounced;
            totals.complained += s.complained;
        }
        totals.open_rate = rate(totals.opened, totals.sent);
        totals.bounce_rate = rate(totals.bounced, totals.sent);
        totals.complaint_rate = rate(totals.complained, totals.sent);
        totals
    }
}
