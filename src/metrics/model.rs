//! Metrics snapshot model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable periodic record of interval and cumulative campaign counters.
///
/// Interval counts are the difference between this snapshot's cumulative
/// counters and the previous snapshot's, floored at zero (counter resets
/// must not produce negative intervals). Rows are append-only and queried
/// newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,

    // Per-interval deltas
    pub sent: i64,
    pub delivered: i64,
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub complained: i64,
    pub unsubscribed: i64,

    // Cumulative-to-date as of interval_end
    pub total_sent: i64,
    pub total_delivered: i64,
    pub total_opened: i64,
    pub total_clicked: i64,
    pub total_bounced: i64,
    pub total_complained: i64,
    pub total_unsubscribed: i64,

    // Cumulative rates at capture time
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
    pub complaint_rate: f64,

    /// Permitted sends per day when the snapshot was captured.
    pub throttle_rate: i64,
    /// Interval sends over the per-interval capacity implied by the rate.
    pub throttle_utilization: f64,

    pub created_at: DateTime<Utc>,
}

/// Divide-by-zero-guarded rate.
pub fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_guards_zero_denominator() {
        assert_eq!(rate(10, 0), 0.0);
        assert_eq!(rate(10, -5), 0.0);
        assert_eq!(rate(1, 4), 0.25);
    }
}
