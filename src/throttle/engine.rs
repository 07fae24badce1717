//! Rule-based throttle policy.
//!
//! A pure function of (recent snapshots, settings). Tiers are evaluated in
//! order and the first match wins; the ordering puts reputation risk ahead
//! of growth, so a complaint spike can never be masked by a good open rate.

use crate::metrics::MetricsSnapshot;
use crate::settings::CampaignAiSettings;
use crate::throttle::model::{RiskLevel, ThrottleAction, ThrottleRecommendation, WindowTotals};

/// Evaluate the rule table against a window of snapshots (newest-first).
///
/// Counts are summed across the window before any rate is derived —
/// per-snapshot rates are never averaged.
pub fn recommend(
    snapshots: &[MetricsSnapshot],
    settings: &CampaignAiSettings,
) -> ThrottleRecommendation {
    let totals = WindowTotals::from_snapshots(snapshots);
    let current = settings.current_throttle_rate;

    // Tier 1: nothing to reason about
    if totals.snapshots == 0 || totals.sent == 0 {
        return ThrottleRecommendation {
            action: ThrottleAction::Maintain,
            new_rate: current,
            reason: "no send activity in the analysis window".into(),
            confidence: 0.5,
            risk: RiskLevel::Low,
            expected_impact: "send rate unchanged".into(),
        };
    }

    // Tier 2: complaint spike — stop before the damage compounds
    if totals.complaint_rate > settings.complaint_rate_threshold * 2.0 {
        return ThrottleRecommendation {
            action: ThrottleAction::Pause,
            new_rate: 0,
            reason: format!(
                "complaint rate {} is more than double the {} threshold",
                pct(totals.complaint_rate),
                pct(settings.complaint_rate_threshold)
            ),
            confidence: 0.95,
            risk: RiskLevel::Critical,
            expected_impact: "sending halts until an operator resumes the campaign".into(),
        };
    }

    // Tier 3: complaints above threshold
    if totals.complaint_rate > settings.complaint_rate_threshold {
        return ThrottleRecommendation {
            action: ThrottleAction::Decrease,
            new_rate: scale(current, 0.5),
            reason: format!(
                "complaint rate {} exceeds the {} threshold",
                pct(totals.complaint_rate),
                pct(settings.complaint_rate_threshold)
            ),
            confidence: 0.9,
            risk: RiskLevel::High,
            expected_impact: "daily send capacity drops by half while complaints cool off".into(),
        };
    }

    // Tier 4: bounces above threshold
    if totals.bounce_rate > settings.bounce_rate_threshold {
        return ThrottleRecommendation {
            action: ThrottleAction::Decrease,
            new_rate: scale(current, 0.7),
            reason: format!(
                "bounce rate {} exceeds the {} threshold",
                pct(totals.bounce_rate),
                pct(settings.bounce_rate_threshold)
            ),
            confidence: 0.85,
            risk: RiskLevel::Medium,
            expected_impact: "daily send capacity drops by 30% to protect deliverability".into(),
        };
    }

    // Tier 5: clean metrics with engagement and headroom
    if totals.complaint_rate < settings.complaint_rate_threshold * 0.5
        && totals.bounce_rate < settings.bounce_rate_threshold * 0.5
        && totals.open_rate > 0.10
        && current < settings.max_throttle_rate
    {
        return ThrottleRecommendation {
            action: ThrottleAction::Increase,
            new_rate: scale(current, 1.25),
            reason: format!(
                "open rate {} with complaint and bounce rates well under thresholds",
                pct(totals.open_rate)
            ),
            confidence: 0.8,
            risk: RiskLevel::Low,
            expected_impact: "daily send capacity grows by 25% toward the configured maximum"
                .into(),
        };
    }

    // Tier 6: nothing actionable
    ThrottleRecommendation {
        action: ThrottleAction::Maintain,
        new_rate: current,
        reason: "metrics within normal bands".into(),
        confidence: 0.7,
        risk: RiskLevel::Low,
        expected_impact: "send rate unchanged".into(),
    }
}

fn scale(rate: i64, factor: f64) -> i64 {
    (rate as f64 * factor).round() as i64
}

fn pct(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn settings() -> CampaignAiSettings {
        let mut s = CampaignAiSettings::defaults_for(Uuid::new_v4());
        s.current_throttle_rate = 10_000;
        s.complaint_rate_threshold = 0.001;
        s.bounce_rate_threshold = 0.05;
        s
    }

    fn snapshot(sent: i64, opened: i64, bounced: i64, complained: i64) -> MetricsSnapshot {
        let now = Utc::now();
        MetricsSnapshot {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            interval_start: now - chrono::Duration::minutes(15),
            interval_end: now,
            sent,
            delivered: sent - bounced,
            opened,
            clicked: 0,
            bounced,
            complained,
            unsubscribed: 0,
            total_sent: sent,
            total_delivered: sent - bounced,
            total_opened: opened,
            total_clicked: 0,
            total_bounced: bounced,
            total_complained: complained,
            total_unsubscribed: 0,
            delivery_rate: 0.0,
            open_rate: 0.0,
            click_rate: 0.0,
            bounce_rate: 0.0,
            complaint_rate: 0.0,
            throttle_rate: 10_000,
            throttle_utilization: 0.0,
            created_at: now,
        }
    }

    #[test]
    fn no_snapshots_maintains_with_low_confidence() {
        let rec = recommend(&[], &settings());
        assert_eq!(rec.action, ThrottleAction::Maintain);
        assert_eq!(rec.confidence, 0.5);
        assert_eq!(rec.new_rate, 10_000);
    }

    #[test]
    fn zero_sends_maintains_with_low_confidence() {
        let rec = recommend(&[snapshot(0, 0, 0, 0)], &settings());
        assert_eq!(rec.action, ThrottleAction::Maintain);
        assert_eq!(rec.confidence, 0.5);
    }

    #[test]
    fn healthy_metrics_increase_by_25_percent() {
        // open 15%, bounce 1%, complaint 0%
        let rec = recommend(&[snapshot(1_000, 150, 10, 0)], &settings());
        assert_eq!(rec.action, ThrottleAction::Increase);
        assert_eq!(rec.new_rate, 12_500);
        assert_eq!(rec.confidence, 0.8);
        assert_eq!(rec.risk, RiskLevel::Low);
    }

    #[test]
    fn high_bounce_rate_decreases_by_30_percent() {
        // bounce 10% > 5% threshold
        let rec = recommend(&[snapshot(1_000, 100, 100, 0)], &settings());
        assert_eq!(rec.action, ThrottleAction::Decrease);
        assert_eq!(rec.new_rate, 7_000);
        assert_eq!(rec.confidence, 0.85);
    }

    #[test]
    fn complaint_above_threshold_halves_rate() {
        // complaint 0.2% > 0.1% threshold, but not double
        let rec = recommend(&[snapshot(1_000, 100, 0, 2)], &settings());
        assert_eq!(rec.action, ThrottleAction::Decrease);
        assert_eq!(rec.new_rate, 5_000);
        assert_eq!(rec.confidence, 0.9);
        assert_eq!(rec.risk, RiskLevel::High);
    }

    #[test]
    fn complaint_spike_pauses() {
        // complaint 0.5% > 2x the 0.1% threshold
        let rec = recommend(&[snapshot(1_000, 100, 0, 5)], &settings());
        assert_eq!(rec.action, ThrottleAction::Pause);
        assert_eq!(rec.new_rate, 0);
        assert_eq!(rec.confidence, 0.95);
        assert_eq!(rec.risk, RiskLevel::Critical);
    }

    #[test]
    fn pause_tier_wins_over_decrease_when_both_match() {
        // 0.3% complaint satisfies both tier 2 (> 0.2%) and tier 3 (> 0.1%);
        // evaluation order must pick pause.
        let rec = recommend(&[snapshot(1_000, 100, 0, 3)], &settings());
        assert_eq!(rec.action, ThrottleAction::Pause);
    }

    #[test]
    fn counts_sum_across_window_instead_of_averaging_rates() {
        // Two snapshots: 10/100 and 0/900 complaints-per-sent. Averaging the
        // per-snapshot complaint rates would give 5%; summing gives 1%.
        let snaps = vec![snapshot(100, 20, 0, 10), snapshot(900, 180, 0, 0)];
        let totals = WindowTotals::from_snapshots(&snaps);
        assert_eq!(totals.sent, 1_000);
        assert_eq!(totals.complained, 10);
        assert_eq!(totals.complaint_rate, 0.01);
    }

    #[test]
    fn no_increase_at_max_rate() {
        let mut s = settings();
        s.current_throttle_rate = s.max_throttle_rate;
        let rec = recommend(&[snapshot(1_000, 150, 10, 0)], &s);
        assert_eq!(rec.action, ThrottleAction::Maintain);
        assert_eq!(rec.confidence, 0.7);
    }

    #[test]
    fn middling_open_rate_maintains() {
        // clean complaint/bounce but open rate under 10%
        let rec = recommend(&[snapshot(1_000, 50, 10, 0)], &settings());
        assert_eq!(rec.action, ThrottleAction::Maintain);
        assert_eq!(rec.confidence, 0.7);
    }
}
