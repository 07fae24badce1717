//! `AdaptiveSendController` — the facade wiring every component over one
//! shared store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::alerts::model::{AiDecision, AlertSeverity, AlertType, CampaignAlert};
use crate::alerts::{AlertService, service as alert_service};
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::events::TrackingEvent;
use crate::health::{self, CampaignHealthScore};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::sendtime::{SendTimeOptimizer, SendTimeRecommendation};
use crate::settings::{CampaignAiSettings, SettingsService, SettingsUpdate};
use crate::store::Store;
use crate::throttle::{AnomalyMonitor, ThrottleController, ThrottleRecommendation};

/// Adaptive send-rate controller for bulk email campaigns.
///
/// Components share one `Arc<dyn Store>`; each campaign's state is
/// processed independently, with the settings cache as the only shared
/// mutable structure.
pub struct AdaptiveSendController {
    store: Arc<dyn Store>,
    config: ControllerConfig,
    settings: Arc<SettingsService>,
    metrics: Arc<MetricsAggregator>,
    throttle: Arc<ThrottleController>,
    alerts: Arc<AlertService>,
    anomaly: AnomalyMonitor,
    sendtime: SendTimeOptimizer,
}

impl AdaptiveSendController {
    /// Wire up all components. Must run inside a tokio runtime (the anomaly
    /// supervisor task is spawned here).
    pub fn new(store: Arc<dyn Store>, config: ControllerConfig) -> Self {
        let settings = Arc::new(SettingsService::new(Arc::clone(&store)));
        let metrics = Arc::new(MetricsAggregator::new(
            Arc::clone(&store),
            Arc::clone(&settings),
            config.clone(),
        ));
        let alerts = Arc::new(AlertService::new(Arc::clone(&store)));
        let throttle = Arc::new(ThrottleController::new(
            Arc::clone(&store),
            Arc::clone(&settings),
            Arc::clone(&metrics),
            Arc::clone(&alerts),
            config.clone(),
        ));
        let anomaly = AnomalyMonitor::new(
            Arc::clone(&store),
            Arc::clone(&settings),
            Arc::clone(&alerts),
            config.clone(),
        );
        let sendtime = SendTimeOptimizer::new(Arc::clone(&store), config.clone());

        Self {
            store,
            config,
            settings,
            metrics,
            throttle,
            alerts,
            anomaly,
            sendtime,
        }
    }

    /// The shared store, for collaborators that ingest counters or
    /// domain aggregates.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Settings for a campaign — persisted row or deterministic defaults.
    pub async fn get_ai_settings(&self, campaign_id: Uuid) -> Result<CampaignAiSettings> {
        Ok((*self.settings.get(campaign_id).await?).clone())
    }

    /// Merge a partial update onto existing-or-default settings and upsert.
    pub async fn save_ai_settings(
        &self,
        campaign_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<CampaignAiSettings> {
        Ok(self.settings.save(campaign_id, update).await?)
    }

    // ── Metrics ─────────────────────────────────────────────────────

    /// Capture one metrics snapshot for a campaign.
    pub async fn record_snapshot(&self, campaign_id: Uuid) -> Result<MetricsSnapshot> {
        self.metrics.record_snapshot(campaign_id).await
    }

    /// Latest snapshot view, if any has been recorded.
    pub async fn realtime_metrics(&self, campaign_id: Uuid) -> Result<Option<MetricsSnapshot>> {
        self.metrics.latest(campaign_id).await
    }

    // ── Throttle ────────────────────────────────────────────────────

    /// Run one throttle optimization cycle.
    pub async fn optimize_throttle(&self, campaign_id: Uuid) -> Result<ThrottleRecommendation> {
        self.throttle.optimize(campaign_id).await
    }

    /// Spawn the periodic snapshot-and-optimize task for a campaign.
    pub fn spawn_periodic_optimizer(
        &self,
        campaign_id: Uuid,
        period: Duration,
    ) -> (JoinHandle<()>, Arc<AtomicBool>) {
        Arc::clone(&self.throttle).spawn_periodic(campaign_id, period)
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Score campaign health from the latest snapshot plus history.
    pub async fn health_score(&self, campaign_id: Uuid) -> Result<CampaignHealthScore> {
        let history = self
            .metrics
            .recent_snapshots(campaign_id, self.config.health_window)
            .await?;
        Ok(health::score(campaign_id, &history))
    }

    // ── Alerts & decisions ──────────────────────────────────────────

    /// All alerts for a campaign, newest-first.
    pub async fn alerts(&self, campaign_id: Uuid) -> Result<Vec<CampaignAlert>> {
        self.alerts.list(campaign_id).await
    }

    /// Alerts grouped by severity, most severe group first. Display only.
    pub async fn alerts_by_severity(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<(AlertSeverity, Vec<CampaignAlert>)>> {
        Ok(alert_service::group_by_severity(
            self.alerts.list(campaign_id).await?,
        ))
    }

    /// Alerts grouped by type. Display only.
    pub async fn alerts_by_type(
        &self,
        campaign_id: Uuid,
    ) -> Result<HashMap<AlertType, Vec<CampaignAlert>>> {
        Ok(alert_service::group_by_type(
            self.alerts.list(campaign_id).await?,
        ))
    }

    /// Acknowledge an alert exactly once; repeats are no-ops.
    pub async fn acknowledge_alert(&self, alert_id: Uuid, acknowledged_by: &str) -> Result<()> {
        self.alerts.acknowledge(alert_id, acknowledged_by).await
    }

    /// Recent decision-log entries, newest-first.
    pub async fn decisions(&self, campaign_id: Uuid, limit: usize) -> Result<Vec<AiDecision>> {
        self.alerts.decisions(campaign_id, limit).await
    }

    // ── Send-time ───────────────────────────────────────────────────

    /// Best send hour for one recipient.
    pub async fn optimal_send_time(&self, recipient: &str) -> Result<SendTimeRecommendation> {
        self.sendtime.optimal_send_time(recipient).await
    }

    /// Best send hours for a batch, preserving input order.
    pub async fn optimal_send_times(
        &self,
        recipients: &[String],
    ) -> Result<Vec<SendTimeRecommendation>> {
        self.sendtime.optimal_send_times(recipients).await
    }

    /// Next future UTC instant at the given hour.
    pub fn next_occurrence(&self, hour: u8) -> Result<DateTime<Utc>> {
        self.sendtime.next_occurrence(hour)
    }

    /// Apply one tracking event to a recipient's profile.
    pub async fn update_inbox_profile(
        &self,
        recipient: &str,
        event_type: crate::events::EventType,
        event_time: DateTime<Utc>,
    ) -> Result<()> {
        self.sendtime
            .update_profile(recipient, event_type, event_time)
            .await
    }

    // ── Event ingestion ─────────────────────────────────────────────

    /// Route one normalized tracking event: update the recipient profile,
    /// then hand negative events to the detached anomaly path. The anomaly
    /// check never delays or fails this call.
    pub async fn observe_event(&self, event: &TrackingEvent) -> Result<()> {
        self.sendtime
            .update_profile(&event.recipient, event.event_type, event.occurred_at)
            .await?;
        self.anomaly.observe(event);
        Ok(())
    }

    /// Direct access to the anomaly monitor (inline checks, tests).
    pub fn anomaly(&self) -> &AnomalyMonitor {
        &self.anomaly
    }
}
