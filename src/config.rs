//! Configuration types.

use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Window of snapshots the decision engine analyzes per cycle.
    pub analysis_window: Duration,
    /// Trailing window the anomaly monitor re-evaluates on bounce/complaint.
    pub anomaly_window: Duration,
    /// Nominal spacing between metrics snapshots (drives throttle utilization).
    pub snapshot_interval: Duration,
    /// Snapshot history considered when scoring campaign health.
    pub health_window: Duration,
    /// Fallback send hour (UTC) when neither profile nor domain data is confident.
    pub default_send_hour: u8,
    /// Minimum cumulative opens before a recipient profile is trusted.
    pub min_profile_opens: i64,
    /// Engagement score step added per open/click, capped at 1.0.
    pub engagement_open_step: f64,
    /// Engagement score step removed per bounce, floored at 0.
    pub engagement_bounce_step: f64,
}

impl ControllerConfig {
    /// Snapshot intervals per day, for per-interval send capacity.
    pub fn intervals_per_day(&self) -> f64 {
        86_400.0 / self.snapshot_interval.as_secs().max(1) as f64
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            analysis_window: Duration::from_secs(15 * 60),
            anomaly_window: Duration::from_secs(5 * 60),
            snapshot_interval: Duration::from_secs(15 * 60),
            health_window: Duration::from_secs(24 * 3600),
            default_send_hour: 10,
            min_profile_opens: 5,
            engagement_open_step: 0.05,
            engagement_bounce_step: 0.2,
        }
    }
}
