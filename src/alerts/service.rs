//! Alert sink and decision log access.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::alerts::model::{AiDecision, AlertSeverity, AlertType, CampaignAlert};
use crate::error::{DatabaseError, Result};
use crate::store::Store;

/// Append-only alert sink plus the decision audit trail.
pub struct AlertService {
    store: Arc<dyn Store>,
}

impl AlertService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append an alert.
    pub async fn raise(&self, alert: CampaignAlert) -> Result<()> {
        debug!(
            campaign_id = %alert.campaign_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            "Raising alert"
        );
        self.store.insert_alert(&alert).await?;
        Ok(())
    }

    /// Append an alert, logging and swallowing any failure. For callers
    /// whose primary mutation must not be blocked by the side channel.
    pub async fn raise_best_effort(&self, alert: CampaignAlert) {
        let campaign_id = alert.campaign_id;
        if let Err(e) = self.raise(alert).await {
            warn!(campaign_id = %campaign_id, "Alert write failed: {e}");
        }
    }

    /// All alerts for a campaign, newest-first.
    pub async fn list(&self, campaign_id: Uuid) -> Result<Vec<CampaignAlert>> {
        Ok(self.store.alerts(campaign_id).await?)
    }

    /// Acknowledge an alert exactly once.
    ///
    /// Repeat acknowledgment is a no-op: the original acknowledger and time
    /// stay untouched. An unknown alert id is a not-found error.
    pub async fn acknowledge(&self, alert_id: Uuid, acknowledged_by: &str) -> Result<()> {
        let newly_acked = self
            .store
            .acknowledge_alert(alert_id, acknowledged_by, Utc::now())
            .await?;

        if !newly_acked {
            // Either already acknowledged (fine) or missing (error).
            if self.store.alert(alert_id).await?.is_none() {
                return Err(DatabaseError::NotFound {
                    entity: "alert".into(),
                    id: alert_id.to_string(),
                }
                .into());
            }
            debug!(alert_id = %alert_id, "Alert already acknowledged, no-op");
        }
        Ok(())
    }

    /// Recent decision-log entries for a campaign, newest-first.
    pub async fn decisions(&self, campaign_id: Uuid, limit: usize) -> Result<Vec<AiDecision>> {
        Ok(self.store.decisions(campaign_id, limit).await?)
    }
}

/// Group alerts by severity for display, most severe group first.
/// Ordering within a group is preserved; nothing is re-scored.
pub fn group_by_severity(
    alerts: Vec<CampaignAlert>,
) -> Vec<(AlertSeverity, Vec<CampaignAlert>)> {
    let mut buckets: HashMap<AlertSeverity, Vec<CampaignAlert>> = HashMap::new();
    for alert in alerts {
        buckets.entry(alert.severity).or_default().push(alert);
    }
    let mut groups: Vec<_> = buckets.into_iter().collect();
    groups.sort_by(|a, b| b.0.cmp(&a.0));
    groups
}

/// Group alerts by type for display. Ordering within a group is preserved.
pub fn group_by_type(alerts: Vec<CampaignAlert>) -> HashMap<AlertType, Vec<CampaignAlert>> {
    let mut buckets: HashMap<AlertType, Vec<CampaignAlert>> = HashMap::new();
    for alert in alerts {
        buckets.entry(alert.alert_type).or_default().push(alert);
    }
    buckets
}
