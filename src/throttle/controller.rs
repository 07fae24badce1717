//! Throttle apply path — turns a recommendation into persisted state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::alerts::AlertService;
use crate::alerts::model::{AiDecision, AlertSeverity, AlertType, CampaignAlert, DecisionType};
use crate::campaign::CampaignStatus;
use crate::config::ControllerConfig;
use crate::error::{Result, ThrottleError};
use crate::metrics::MetricsAggregator;
use crate::settings::SettingsService;
use crate::store::Store;
use crate::throttle::engine;
use crate::throttle::model::{ThrottleAction, ThrottleRecommendation, WindowTotals};

/// Runs decision cycles and applies their outcome.
///
/// Rate changes go through a compare-and-swap on the stored current rate,
/// so two concurrent cycles for the same campaign cannot double-apply — the
/// loser's swap misses and the decision is recorded as not applied.
pub struct ThrottleController {
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    metrics: Arc<MetricsAggregator>,
    alerts: Arc<AlertService>,
    config: ControllerConfig,
}

impl ThrottleController {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        metrics: Arc<MetricsAggregator>,
        alerts: Arc<AlertService>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            settings,
            metrics,
            alerts,
            config,
        }
    }

    /// Run one optimization cycle for a campaign.
    ///
    /// Rejects without mutating when throttle optimization is disabled or no
    /// snapshots exist in the analysis window. Every evaluated action lands
    /// in the decision log, maintain included; log and alert writes are
    /// best-effort and never block the primary mutation.
    pub async fn optimize(&self, campaign_id: Uuid) -> Result<ThrottleRecommendation> {
        let settings = self.settings.get(campaign_id).await?;
        if !settings.throttle_optimization_enabled {
            return Err(ThrottleError::OptimizationDisabled { campaign_id }.into());
        }

        let snapshots = self
            .metrics
            .recent_snapshots(campaign_id, self.config.analysis_window)
            .await?;
        if snapshots.is_empty() {
            return Err(ThrottleError::InsufficientData {
                campaign_id,
                window: self.config.analysis_window,
            }
            .into());
        }

        let mut rec = engine::recommend(&snapshots, &settings);
        let totals = WindowTotals::from_snapshots(&snapshots);
        let old_rate = settings.current_throttle_rate;

        let (decision_type, new_value, applied) = match rec.action {
            ThrottleAction::Maintain => (DecisionType::ThrottleMaintain, old_rate, true),

            ThrottleAction::Increase | ThrottleAction::Decrease => {
                let new_rate = settings.clamp_rate(rec.new_rate);
                rec.new_rate = new_rate;

                let swapped = self
                    .store
                    .swap_throttle_rate(campaign_id, old_rate, new_rate)
                    .await?;
                if swapped {
                    self.settings.invalidate(campaign_id).await;
                    info!(
                        campaign_id = %campaign_id,
                        action = %rec.action,
                        old_rate,
                        new_rate,
                        "Throttle rate updated"
                    );
                } else {
                    // A concurrent cycle won; its value stands.
                    info!(
                        campaign_id = %campaign_id,
                        old_rate,
                        "Lost throttle rate race, no adjustment applied"
                    );
                }

                let decision_type = if rec.action == ThrottleAction::Increase {
                    DecisionType::ThrottleIncrease
                } else {
                    DecisionType::ThrottleDecrease
                };
                (decision_type, new_rate, swapped)
            }

            ThrottleAction::Pause => {
                // Primary mutation: surfaced to the caller on failure.
                self.store
                    .set_campaign_status(campaign_id, CampaignStatus::Paused)
                    .await?;
                warn!(
                    campaign_id = %campaign_id,
                    complaint_rate = totals.complaint_rate,
                    "Campaign paused by throttle policy"
                );

                self.alerts
                    .raise_best_effort(CampaignAlert::new(
                        campaign_id,
                        AlertType::CampaignPaused,
                        AlertSeverity::Critical,
                        "Campaign auto-paused",
                        rec.reason.clone(),
                        settings.complaint_rate_threshold * 2.0,
                        totals.complaint_rate,
                    ))
                    .await;

                (DecisionType::CampaignPause, 0, true)
            }
        };

        let decision = AiDecision::new(
            campaign_id,
            decision_type,
            rec.reason.clone(),
            old_rate,
            new_value,
            serde_json::to_value(totals).unwrap_or_else(|_| serde_json::json!({})),
            rec.confidence,
            applied,
        );
        if let Err(e) = self.store.insert_decision(&decision).await {
            warn!(campaign_id = %campaign_id, "Decision log write failed: {e}");
        }

        Ok(rec)
    }

    /// Spawn a background task that records a snapshot and runs one
    /// optimization cycle per tick.
    ///
    /// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop.
    pub fn spawn_periodic(
        self: Arc<Self>,
        campaign_id: Uuid,
        period: Duration,
    ) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let controller = self;

        let handle = tokio::spawn(async move {
            info!(
                campaign_id = %campaign_id,
                period_secs = period.as_secs(),
                "Periodic throttle optimizer started"
            );

            let mut tick = tokio::time::interval(period);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!(campaign_id = %campaign_id, "Periodic throttle optimizer shutting down");
                    return;
                }

                controller.run_cycle(campaign_id).await;
            }
        });

        (handle, shutdown_flag)
    }

    /// One snapshot-then-optimize cycle; failures are logged, never fatal.
    async fn run_cycle(&self, campaign_id: Uuid) {
        if let Err(e) = self.metrics.record_snapshot(campaign_id).await {
            warn!(campaign_id = %campaign_id, "Snapshot recording failed: {e}");
            return;
        }
        if let Err(e) = self.optimize(campaign_id).await {
            warn!(campaign_id = %campaign_id, "Throttle optimization failed: {e}");
        }
    }
}
