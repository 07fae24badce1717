//! Health scoring rules.
//!
//! Sub-scores come from the latest snapshot's cumulative rates only; trends
//! come from comparing the oldest and newest snapshots in the history. A
//! campaign with no snapshots scores a clean 100 across the board.

use chrono::Utc;
use uuid::Uuid;

use crate::health::model::{CampaignHealthScore, HealthTrends, Trend};
use crate::metrics::MetricsSnapshot;

/// Relative change below which a metric is considered stable.
const TREND_BAND: f64 = 0.05;

/// Score a campaign from its snapshot history, newest-first.
pub fn score(campaign_id: Uuid, history: &[MetricsSnapshot]) -> CampaignHealthScore {
    let Some(latest) = history.first() else {
        return CampaignHealthScore {
            campaign_id,
            overall: 100.0,
            deliverability: 100.0,
            engagement: 100.0,
            reputation: 100.0,
            issues: Vec::new(),
            recommendations: Vec::new(),
            trends: HealthTrends::default(),
            generated_at: Utc::now(),
        };
    };

    let deliverability = (100.0 - latest.bounce_rate * 1_000.0).max(0.0);
    let engagement = (latest.open_rate * 500.0).min(100.0);
    let reputation = (100.0 - latest.complaint_rate * 10_000.0).max(0.0);
    let overall = 0.3 * deliverability + 0.3 * engagement + 0.4 * reputation;

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    if deliverability < 80.0 {
        issues.push("bounce rate is dragging deliverability down".to_string());
        recommendations
            .push("clean the recipient list and verify addresses before the next send".to_string());
    }
    if engagement < 50.0 {
        issues.push("open rate is well below a healthy level".to_string());
        recommendations
            .push("review subject lines and enable send-time optimization".to_string());
    }
    if reputation < 90.0 {
        issues.push("complaint rate is elevated".to_string());
        recommendations
            .push("tighten list consent and suppress unengaged recipients".to_string());
    }

    CampaignHealthScore {
        campaign_id,
        overall,
        deliverability,
        engagement,
        reputation,
        issues,
        recommendations,
        trends: trends(history),
        generated_at: Utc::now(),
    }
}

/// Oldest-vs-newest trend per rate metric.
fn trends(history: &[MetricsSnapshot]) -> HealthTrends {
    let (Some(newest), Some(oldest)) = (history.first(), history.last()) else {
        return HealthTrends::default();
    };
    if history.len() < 2 {
        return HealthTrends::default();
    }
    HealthTrends {
        open_rate: classify(oldest.open_rate, newest.open_rate),
        bounce_rate: classify(oldest.bounce_rate, newest.bounce_rate),
        complaint_rate: classify(oldest.complaint_rate, newest.complaint_rate),
    }
}

/// Classify relative change at a +/-5% band.
pub fn classify(oldest: f64, newest: f64) -> Trend {
    if oldest == 0.0 {
        return if newest > 0.0 {
            Trend::Increasing
        } else {
            Trend::Stable
        };
    }
    let change = (newest - oldest) / oldest;
    if change > TREND_BAND {
        Trend::Increasing
    } else if change < -TREND_BAND {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snapshot_with_totals(
        total_sent: i64,
        total_opened: i64,
        total_bounced: i64,
        total_complained: i64,
    ) -> MetricsSnapshot {
        let now = Utc::now();
        let rate = crate::metrics::model::rate;
        MetricsSnapshot {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            interval_start: now - chrono::Duration::minutes(15),
            interval_end: now,
            sent: 0,
            delivered: 0,
            opened: 0,
            clicked: 0,
            bounced: 0,
            complained: 0,
            unsubscribed: 0,
            total_sent,
            total_delivered: total_sent - total_bounced,
            total_opened,
            total_clicked: 0,
            total_bounced,
            total_complained,
            total_unsubscribed: 0,
            delivery_rate: rate(total_sent - total_bounced, total_sent),
            open_rate: rate(total_opened, total_sent),
            click_rate: 0.0,
            bounce_rate: rate(total_bounced, total_sent),
            complaint_rate: rate(total_complained, total_sent),
            throttle_rate: 10_000,
            throttle_utilization: 0.0,
            created_at: now,
        }
    }

    #[test]
    fn no_snapshots_scores_a_clean_hundred() {
        let s = score(Uuid::new_v4(), &[]);
        assert_eq!(s.overall, 100.0);
        assert_eq!(s.deliverability, 100.0);
        assert_eq!(s.engagement, 100.0);
        assert_eq!(s.reputation, 100.0);
        assert!(s.issues.is_empty());
    }

    #[test]
    fn scores_from_latest_cumulative_rates() {
        // bounce 5% -> deliverability 50; open 20% -> engagement capped at 100;
        // complaint 0.1% -> reputation 90; overall 0.3*50 + 0.3*100 + 0.4*90 = 81
        let s = score(Uuid::new_v4(), &[snapshot_with_totals(1_000, 200, 50, 1)]);
        assert_eq!(s.deliverability, 50.0);
        assert_eq!(s.engagement, 100.0);
        assert_eq!(s.reputation, 90.0);
        assert!((s.overall - 81.0).abs() < 1e-9);
    }

    #[test]
    fn sub_scores_floor_at_zero() {
        // bounce 20% -> 100 - 200 floors at 0; complaint 2% -> 100 - 200 floors at 0
        let s = score(Uuid::new_v4(), &[snapshot_with_totals(1_000, 10, 200, 20)]);
        assert_eq!(s.deliverability, 0.0);
        assert_eq!(s.reputation, 0.0);
    }

    #[test]
    fn issues_emitted_below_thresholds() {
        // deliverability 50 < 80, engagement 5 < 50, reputation 80 < 90
        let s = score(Uuid::new_v4(), &[snapshot_with_totals(1_000, 10, 50, 2)]);
        assert_eq!(s.issues.len(), 3);
        assert_eq!(s.recommendations.len(), 3);
    }

    #[test]
    fn healthy_campaign_has_no_issues() {
        let s = score(Uuid::new_v4(), &[snapshot_with_totals(1_000, 300, 10, 0)]);
        assert!(s.issues.is_empty());
        assert!(s.recommendations.is_empty());
    }

    #[test]
    fn trend_compares_oldest_against_newest() {
        // newest-first: open rate moved 0.10 -> 0.20, bounce 0.05 -> 0.02
        let newest = snapshot_with_totals(2_000, 400, 40, 0);
        let oldest = snapshot_with_totals(1_000, 100, 50, 0);
        let s = score(Uuid::new_v4(), &[newest, oldest]);
        assert_eq!(s.trends.open_rate, Trend::Increasing);
        assert_eq!(s.trends.bounce_rate, Trend::Decreasing);
        assert_eq!(s.trends.complaint_rate, Trend::Stable);
    }

    #[test]
    fn trend_band_treats_small_moves_as_stable() {
        assert_eq!(classify(0.100, 0.104), Trend::Stable);
        assert_eq!(classify(0.100, 0.096), Trend::Stable);
        assert_eq!(classify(0.100, 0.106), Trend::Increasing);
        assert_eq!(classify(0.100, 0.094), Trend::Decreasing);
    }

    #[test]
    fn trend_from_zero_baseline() {
        assert_eq!(classify(0.0, 0.01), Trend::Increasing);
        assert_eq!(classify(0.0, 0.0), Trend::Stable);
    }

    #[test]
    fn single_snapshot_has_stable_trends() {
        let s = score(Uuid::new_v4(), &[snapshot_with_totals(1_000, 200, 10, 0)]);
        assert_eq!(s.trends.open_rate, Trend::Stable);
    }
}
