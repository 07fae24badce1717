//! Anomaly monitor — fast pause path for bounce/complaint spikes.
//!
//! Runs detached from the webhook/tracking call that triggers it, so the
//! caller acknowledges immediately. This bounds worst-case reaction latency
//! independently of the periodic optimization cycle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::alerts::AlertService;
use crate::alerts::model::{AiDecision, AlertSeverity, AlertType, CampaignAlert, DecisionType};
use crate::campaign::CampaignStatus;
use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::events::TrackingEvent;
use crate::settings::SettingsService;
use crate::store::Store;
use crate::throttle::model::WindowTotals;

/// A failed detached check, reported to the supervisor.
struct CheckFailure {
    campaign_id: Uuid,
    error: Error,
}

/// Watches negative events and auto-pauses a campaign when the trailing
/// window's complaint rate crosses the threshold.
///
/// Checks are submitted as detached tasks; their failures flow into an
/// error channel drained by a supervisor task and are never propagated to
/// the triggering caller.
pub struct AnomalyMonitor {
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    alerts: Arc<AlertService>,
    config: ControllerConfig,
    failure_tx: mpsc::UnboundedSender<CheckFailure>,
}

impl AnomalyMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        alerts: Arc<AlertService>,
        config: ControllerConfig,
    ) -> Self {
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<CheckFailure>();

        // Supervisor: observe and log every failed check.
        tokio::spawn(async move {
            while let Some(failure) = failure_rx.recv().await {
                error!(
                    campaign_id = %failure.campaign_id,
                    "Anomaly check failed: {}",
                    failure.error
                );
            }
        });

        Self {
            store,
            settings,
            alerts,
            config,
            failure_tx,
        }
    }

    /// Fire-and-forget entry point. Returns immediately; the check runs
    /// detached and its failure is observed by the supervisor.
    pub fn observe(&self, event: &TrackingEvent) {
        if !event.event_type.is_negative() {
            return;
        }

        let store = Arc::clone(&self.store);
        let settings = Arc::clone(&self.settings);
        let alerts = Arc::clone(&self.alerts);
        let config = self.config.clone();
        let campaign_id = event.campaign_id;
        let failure_tx = self.failure_tx.clone();

        tokio::spawn(async move {
            if let Err(error) =
                check_campaign(store, settings, alerts, config, campaign_id).await
            {
                let _ = failure_tx.send(CheckFailure { campaign_id, error });
            }
        });
    }

    /// Run the check inline. Used by tests and callers that want the result.
    pub async fn check_now(&self, campaign_id: Uuid) -> Result<()> {
        check_campaign(
            Arc::clone(&self.store),
            Arc::clone(&self.settings),
            Arc::clone(&self.alerts),
            self.config.clone(),
            campaign_id,
        )
        .await
    }
}

/// Re-evaluate the trailing anomaly window and pause on a sustained
/// complaint spike.
async fn check_campaign(
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    alerts: Arc<AlertService>,
    config: ControllerConfig,
    campaign_id: Uuid,
) -> Result<()> {
    let settings = settings.get(campaign_id).await?;
    if !settings.pause_on_high_complaints {
        return Ok(());
    }

    let since = Utc::now()
        - chrono::Duration::from_std(config.anomaly_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
    let snapshots = store.recent_snapshots(campaign_id, since).await?;
    let totals = WindowTotals::from_snapshots(&snapshots);

    if totals.sent == 0 || totals.complaint_rate <= settings.complaint_rate_threshold {
        return Ok(());
    }

    // Already paused by a previous check or the periodic cycle.
    if store.campaign_status(campaign_id).await? == CampaignStatus::Paused {
        return Ok(());
    }

    store
        .set_campaign_status(campaign_id, CampaignStatus::Paused)
        .await?;
    warn!(
        campaign_id = %campaign_id,
        complaint_rate = totals.complaint_rate,
        threshold = settings.complaint_rate_threshold,
        "Campaign paused by anomaly monitor"
    );

    let reason = format!(
        "complaint rate {:.2}% crossed the {:.2}% threshold in the trailing window",
        totals.complaint_rate * 100.0,
        settings.complaint_rate_threshold * 100.0
    );

    alerts
        .raise_best_effort(CampaignAlert::new(
            campaign_id,
            AlertType::HighComplaintRate,
            AlertSeverity::Critical,
            "Campaign auto-paused by anomaly monitor",
            reason.clone(),
            settings.complaint_rate_threshold,
            totals.complaint_rate,
        ))
        .await;

    let decision = AiDecision::new(
        campaign_id,
        DecisionType::CampaignPause,
        reason,
        settings.current_throttle_rate,
        0,
        serde_json::to_value(totals).unwrap_or_else(|_| serde_json::json!({})),
        0.95,
        true,
    );
    if let Err(e) = store.insert_decision(&decision).await {
        warn!(campaign_id = %campaign_id, "Decision log write failed: {e}");
    }

    Ok(())
}
