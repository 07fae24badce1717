//! Unified `Store` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::alerts::model::{AiDecision, CampaignAlert};
use crate::campaign::{CampaignCounters, CampaignStatus};
use crate::error::DatabaseError;
use crate::events::EventType;
use crate::metrics::MetricsSnapshot;
use crate::sendtime::model::{DomainSendTime, InboxProfile};
use crate::settings::CampaignAiSettings;

/// Backend-agnostic store covering settings, snapshots, decisions, alerts,
/// and inbox profiles.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Campaigns (externally owned; read counters, request pause) ──

    /// Cumulative counters maintained by campaign management.
    async fn campaign_counters(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignCounters, DatabaseError>;

    /// Upsert counters — the ingestion path campaign management writes through.
    async fn upsert_campaign_counters(
        &self,
        campaign_id: Uuid,
        counters: &CampaignCounters,
    ) -> Result<(), DatabaseError>;

    async fn campaign_status(&self, campaign_id: Uuid)
    -> Result<CampaignStatus, DatabaseError>;

    async fn set_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    /// Persisted settings row, if one exists.
    async fn ai_settings(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<CampaignAiSettings>, DatabaseError>;

    /// Insert or replace the settings row.
    async fn upsert_ai_settings(
        &self,
        settings: &CampaignAiSettings,
    ) -> Result<(), DatabaseError>;

    /// Compare-and-swap the current throttle rate.
    ///
    /// Returns `true` if the stored rate matched `expected` and was updated;
    /// `false` means another optimization won the race and nothing changed.
    async fn swap_throttle_rate(
        &self,
        campaign_id: Uuid,
        expected: i64,
        new_rate: i64,
    ) -> Result<bool, DatabaseError>;

    // ── Metrics snapshots ───────────────────────────────────────────

    /// Append an immutable snapshot.
    async fn insert_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), DatabaseError>;

    /// Most recent snapshot for a campaign.
    async fn latest_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<MetricsSnapshot>, DatabaseError>;

    /// Snapshots with `interval_end` at or after `since`, newest-first.
    async fn recent_snapshots(
        &self,
        campaign_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricsSnapshot>, DatabaseError>;

    // ── Decision log ────────────────────────────────────────────────

    /// Append an immutable decision record.
    async fn insert_decision(&self, decision: &AiDecision) -> Result<(), DatabaseError>;

    /// Recent decisions for a campaign, newest-first, up to `limit`.
    async fn decisions(
        &self,
        campaign_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AiDecision>, DatabaseError>;

    // ── Alerts ──────────────────────────────────────────────────────

    async fn insert_alert(&self, alert: &CampaignAlert) -> Result<(), DatabaseError>;

    async fn alert(&self, alert_id: Uuid) -> Result<Option<CampaignAlert>, DatabaseError>;

    /// All alerts for a campaign, newest-first.
    async fn alerts(&self, campaign_id: Uuid) -> Result<Vec<CampaignAlert>, DatabaseError>;

    /// Set acknowledger and time if the alert is still unacknowledged.
    /// Returns `true` only when this call performed the acknowledgment.
    async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        acknowledged_by: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    // ── Inbox profiles ──────────────────────────────────────────────

    /// Full profile for an address hash, including histograms.
    async fn inbox_profile(
        &self,
        address_hash: &str,
    ) -> Result<Option<InboxProfile>, DatabaseError>;

    /// Apply one tracking event as an upsert-then-increment.
    ///
    /// Engagement moves by `open_step` (capped at 1.0) on open/click, down by
    /// `bounce_step` (floored at 0) on bounce, and resets to 0 on complaint.
    /// The row is never rewritten wholesale.
    async fn apply_profile_event(
        &self,
        address_hash: &str,
        domain: &str,
        event: EventType,
        event_time: DateTime<Utc>,
        open_step: f64,
        bounce_step: f64,
    ) -> Result<(), DatabaseError>;

    // ── Domain aggregates ───────────────────────────────────────────

    /// Domain-level optimal-hour aggregate, if the external job produced one.
    async fn domain_send_time(
        &self,
        domain: &str,
    ) -> Result<Option<DomainSendTime>, DatabaseError>;

    /// Ingestion path for the external statistics job.
    async fn upsert_domain_send_time(
        &self,
        send_time: &DomainSendTime,
    ) -> Result<(), DatabaseError>;
}
