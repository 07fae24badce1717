//! Metrics aggregator — cumulative counters to interval snapshots.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::campaign::CampaignCounters;
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::metrics::model::{MetricsSnapshot, rate};
use crate::settings::SettingsService;
use crate::store::Store;

/// Turns cumulative campaign counters into an append-only snapshot log.
pub struct MetricsAggregator {
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    config: ControllerConfig,
}

impl MetricsAggregator {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            settings,
            config,
        }
    }

    /// Capture one snapshot: read cumulative counters and the prior snapshot,
    /// derive interval deltas and rates, persist the result.
    pub async fn record_snapshot(&self, campaign_id: Uuid) -> Result<MetricsSnapshot> {
        let counters = self.store.campaign_counters(campaign_id).await?;
        let prev = self.store.latest_snapshot(campaign_id).await?;
        let settings = self.settings.get(campaign_id).await?;

        let snapshot = build_snapshot(
            campaign_id,
            &counters,
            prev.as_ref(),
            settings.current_throttle_rate,
            self.config.intervals_per_day(),
            self.config.snapshot_interval,
            Utc::now(),
        );

        self.store.insert_snapshot(&snapshot).await?;
        debug!(
            campaign_id = %campaign_id,
            sent = snapshot.sent,
            utilization = snapshot.throttle_utilization,
            "Snapshot recorded"
        );
        Ok(snapshot)
    }

    /// Snapshots within the trailing `window`, newest-first.
    ///
    /// An empty result is valid — callers read it as "insufficient data".
    pub async fn recent_snapshots(
        &self,
        campaign_id: Uuid,
        window: Duration,
    ) -> Result<Vec<MetricsSnapshot>> {
        let since = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::minutes(15));
        Ok(self.store.recent_snapshots(campaign_id, since).await?)
    }

    /// The most recent snapshot, if any.
    pub async fn latest(&self, campaign_id: Uuid) -> Result<Option<MetricsSnapshot>> {
        Ok(self.store.latest_snapshot(campaign_id).await?)
    }
}

/// Pure snapshot construction from counters and the prior snapshot.
///
/// Interval deltas are floored at zero so a counter reset upstream yields an
/// empty interval rather than a negative one.
pub fn build_snapshot(
    campaign_id: Uuid,
    counters: &CampaignCounters,
    prev: Option<&MetricsSnapshot>,
    throttle_rate: i64,
    intervals_per_day: f64,
    snapshot_interval: Duration,
    now: DateTime<Utc>,
) -> MetricsSnapshot {
    let delta = |current: i64, previous: i64| (current - previous).max(0);

    let (interval_start, p) = match prev {
        Some(p) => (p.interval_end, totals_of(p)),
        None => (
            now - chrono::Duration::from_std(snapshot_interval)
                .unwrap_or_else(|_| chrono::Duration::minutes(15)),
            CampaignCounters::default(),
        ),
    };

    let sent = delta(counters.sent, p.sent);
    let per_interval_capacity = throttle_rate as f64 / intervals_per_day.max(1.0);
    let throttle_utilization = if per_interval_capacity > 0.0 {
        sent as f64 / per_interval_capacity
    } else {
        0.0
    };

    MetricsSnapshot {
        id: Uuid::new_v4(),
        campaign_id,
        interval_start,
        interval_end: now,
        sent,
        delivered: delta(counters.delivered, p.delivered),
        opened: delta(counters.opened, p.opened),
        clicked: delta(counters.clicked, p.clicked),
        bounced: delta(counters.bounced, p.bounced),
        complained: delta(counters.complained, p.complained),
        unsubscribed: delta(counters.unsubscribed, p.unsubscribed),
        total_sent: counters.sent,
        total_delivered: counters.delivered,
        total_opened: counters.opened,
        total_clicked: counters.clicked,
        total_bounced: counters.bounced,
        total_complained: counters.complained,
        total_unsubscribed: counters.unsubscribed,
        delivery_rate: rate(counters.delivered, counters.sent),
        open_rate: rate(counters.opened, counters.sent),
        click_rate: rate(counters.clicked, counters.sent),
        bounce_rate: rate(counters.bounced, counters.sent),
        complaint_rate: rate(counters.complained, counters.sent),
        throttle_rate,
        throttle_utilization,
        created_at: now,
    }
}

/// A snapshot's cumulative columns viewed as counters.
fn totals_of(snapshot: &MetricsSnapshot) -> CampaignCounters {
    CampaignCounters {
        sent: snapshot.total_sent,
        delivered: snapshot.total_delivered,
        opened: snapshot.total_opened,
        clicked: snapshot.total_clicked,
        bounced: snapshot.total_bounced,
        complained: snapshot.total_complained,
        unsubscribed: snapshot.total_unsubscribed,
    }
}
