//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::alerts::model::{AiDecision, AlertSeverity, AlertType, CampaignAlert, DecisionType};
use crate::campaign::{CampaignCounters, CampaignStatus};
use crate::error::DatabaseError;
use crate::events::EventType;
use crate::health::scorer::classify;
use crate::metrics::MetricsSnapshot;
use crate::sendtime::model::{DomainSendTime, InboxProfile};
use crate::settings::CampaignAiSettings;
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL store backend.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

// ── Row mappers ─────────────────────────────────────────────────────

const SETTINGS_COLUMNS: &str = "campaign_id, smart_sending_enabled, throttle_optimization_enabled, \
    send_time_optimization_enabled, ab_auto_winner_enabled, target_metric, min_throttle_rate, \
    max_throttle_rate, current_throttle_rate, learning_period_days, ab_confidence_threshold, \
    ab_min_sample_size, complaint_rate_threshold, bounce_rate_threshold, pause_on_high_complaints, \
    created_at, updated_at";

fn row_to_settings(row: &libsql::Row) -> Result<CampaignAiSettings, libsql::Error> {
    let campaign_id: String = row.get(0)?;
    let target_metric: String = row.get(5)?;
    let created_str: String = row.get(15)?;
    let updated_str: String = row.get(16)?;

    Ok(CampaignAiSettings {
        campaign_id: parse_uuid(&campaign_id),
        smart_sending_enabled: row.get::<i64>(1)? != 0,
        throttle_optimization_enabled: row.get::<i64>(2)? != 0,
        send_time_optimization_enabled: row.get::<i64>(3)? != 0,
        ab_auto_winner_enabled: row.get::<i64>(4)? != 0,
        target_metric: target_metric.parse().unwrap_or_default(),
        min_throttle_rate: row.get(6)?,
        max_throttle_rate: row.get(7)?,
        current_throttle_rate: row.get(8)?,
        learning_period_days: row.get::<i64>(9)? as u32,
        ab_confidence_threshold: row.get(10)?,
        ab_min_sample_size: row.get(11)?,
        complaint_rate_threshold: row.get(12)?,
        bounce_rate_threshold: row.get(13)?,
        pause_on_high_complaints: row.get::<i64>(14)? != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const SNAPSHOT_COLUMNS: &str = "id, campaign_id, interval_start, interval_end, sent, delivered, \
    opened, clicked, bounced, complained, unsubscribed, total_sent, total_delivered, total_opened, \
    total_clicked, total_bounced, total_complained, total_unsubscribed, delivery_rate, open_rate, \
    click_rate, bounce_rate, complaint_rate, throttle_rate, throttle_utilization, created_at";

fn row_to_snapshot(row: &libsql::Row) -> Result<MetricsSnapshot, libsql::Error> {
    let id: String = row.get(0)?;
    let campaign_id: String = row.get(1)?;
    let interval_start: String = row.get(2)?;
    let interval_end: String = row.get(3)?;
    let created_str: String = row.get(25)?;

    Ok(MetricsSnapshot {
        id: parse_uuid(&id),
        campaign_id: parse_uuid(&campaign_id),
        interval_start: parse_datetime(&interval_start),
        interval_end: parse_datetime(&interval_end),
        sent: row.get(4)?,
        delivered: row.get(5)?,
        opened: row.get(6)?,
        clicked: row.get(7)?,
        bounced: row.get(8)?,
        complained: row.get(9)?,
        unsubscribed: row.get(10)?,
        total_sent: row.get(11)?,
        total_delivered: row.get(12)?,
        total_opened: row.get(13)?,
        total_clicked: row.get(14)?,
        total_bounced: row.get(15)?,
        total_complained: row.get(16)?,
        total_unsubscribed: row.get(17)?,
        delivery_rate: row.get(18)?,
        open_rate: row.get(19)?,
        click_rate: row.get(20)?,
        bounce_rate: row.get(21)?,
        complaint_rate: row.get(22)?,
        throttle_rate: row.get(23)?,
        throttle_utilization: row.get(24)?,
        created_at: parse_datetime(&created_str),
    })
}

const DECISION_COLUMNS: &str = "id, campaign_id, decision_type, reason, old_value, new_value, \
    metrics, confidence, applied, applied_at, reverted, reverted_at, reverted_by, created_at";

fn row_to_decision(row: &libsql::Row) -> Result<AiDecision, libsql::Error> {
    let id: String = row.get(0)?;
    let campaign_id: String = row.get(1)?;
    let decision_type: String = row.get(2)?;
    let metrics_str: String = row.get(6)?;
    let applied_at: Option<String> = row.get(9).ok();
    let reverted_at: Option<String> = row.get(11).ok();
    let created_str: String = row.get(13)?;

    Ok(AiDecision {
        id: parse_uuid(&id),
        campaign_id: parse_uuid(&campaign_id),
        decision_type: decision_type
            .parse()
            .unwrap_or(DecisionType::ThrottleMaintain),
        reason: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        metrics: serde_json::from_str(&metrics_str).unwrap_or_else(|_| serde_json::json!({})),
        confidence: row.get(7)?,
        applied: row.get::<i64>(8)? != 0,
        applied_at: parse_optional_datetime(&applied_at),
        reverted: row.get::<i64>(10)? != 0,
        reverted_at: parse_optional_datetime(&reverted_at),
        reverted_by: row.get(12).ok(),
        created_at: parse_datetime(&created_str),
    })
}

const ALERT_COLUMNS: &str = "id, campaign_id, alert_type, severity, title, message, \
    threshold_value, actual_value, acknowledged, acknowledged_by, acknowledged_at, created_at";

fn row_to_alert(row: &libsql::Row) -> Result<CampaignAlert, libsql::Error> {
    let id: String = row.get(0)?;
    let campaign_id: String = row.get(1)?;
    let alert_type: String = row.get(2)?;
    let severity: String = row.get(3)?;
    let acknowledged_at: Option<String> = row.get(10).ok();
    let created_str: String = row.get(11)?;

    Ok(CampaignAlert {
        id: parse_uuid(&id),
        campaign_id: parse_uuid(&campaign_id),
        alert_type: alert_type.parse().unwrap_or(AlertType::ThrottleAdjusted),
        severity: severity.parse().unwrap_or(AlertSeverity::Info),
        title: row.get(4)?,
        message: row.get(5)?,
        threshold_value: row.get(6)?,
        actual_value: row.get(7)?,
        acknowledged: row.get::<i64>(8)? != 0,
        acknowledged_by: row.get(9).ok(),
        acknowledged_at: parse_optional_datetime(&acknowledged_at),
        created_at: parse_datetime(&created_str),
    })
}

const PROFILE_COLUMNS: &str = "address_hash, email_domain, optimal_hour, optimal_hour_confidence, \
    avg_open_delay_minutes, avg_click_delay_minutes, engagement_score, engagement_prev, \
    total_sent, total_opens, total_clicks, total_bounces, total_complaints, last_sent_at, \
    last_event_at, created_at, updated_at";

fn row_to_profile(row: &libsql::Row) -> Result<InboxProfile, libsql::Error> {
    let optimal_hour: Option<i64> = row.get(2).ok();
    let engagement_score: f64 = row.get(6)?;
    let engagement_prev: f64 = row.get(7)?;
    let last_sent_at: Option<String> = row.get(13).ok();
    let last_event_at: Option<String> = row.get(14).ok();
    let created_str: String = row.get(15)?;
    let updated_str: String = row.get(16)?;

    Ok(InboxProfile {
        address_hash: row.get(0)?,
        email_domain: row.get(1)?,
        optimal_hour: optimal_hour.map(|h| h as u8),
        optimal_hour_confidence: row.get(3)?,
        avg_open_delay_minutes: row.get(4)?,
        avg_click_delay_minutes: row.get(5)?,
        engagement_score,
        engagement_trend: classify(engagement_prev, engagement_score),
        total_sent: row.get(8)?,
        total_opens: row.get(9)?,
        total_clicks: row.get(10)?,
        total_bounces: row.get(11)?,
        total_complaints: row.get(12)?,
        hourly_opens: [0; 24],
        daily_opens: [0; 7],
        last_sent_at: parse_optional_datetime(&last_sent_at),
        last_event_at: parse_optional_datetime(&last_event_at),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Campaigns ───────────────────────────────────────────────────

    async fn campaign_counters(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignCounters, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT sent, delivered, opened, clicked, bounced, complained, unsubscribed \
                 FROM campaigns WHERE id = ?1",
                params![campaign_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(CampaignCounters {
                sent: row.get(0).map_err(query_err)?,
                delivered: row.get(1).map_err(query_err)?,
                opened: row.get(2).map_err(query_err)?,
                clicked: row.get(3).map_err(query_err)?,
                bounced: row.get(4).map_err(query_err)?,
                complained: row.get(5).map_err(query_err)?,
                unsubscribed: row.get(6).map_err(query_err)?,
            }),
            None => Err(DatabaseError::NotFound {
                entity: "campaign".into(),
                id: campaign_id.to_string(),
            }),
        }
    }

    async fn upsert_campaign_counters(
        &self,
        campaign_id: Uuid,
        counters: &CampaignCounters,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO campaigns (id, sent, delivered, opened, clicked, bounced, complained, unsubscribed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(id) DO UPDATE SET \
                    sent = excluded.sent, delivered = excluded.delivered, opened = excluded.opened, \
                    clicked = excluded.clicked, bounced = excluded.bounced, \
                    complained = excluded.complained, unsubscribed = excluded.unsubscribed, \
                    updated_at = datetime('now')",
                params![
                    campaign_id.to_string(),
                    counters.sent,
                    counters.delivered,
                    counters.opened,
                    counters.clicked,
                    counters.bounced,
                    counters.complained,
                    counters.unsubscribed,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn campaign_status(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignStatus, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT status FROM campaigns WHERE id = ?1",
                params![campaign_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let status: String = row.get(0).map_err(query_err)?;
                Ok(status.parse().unwrap_or(CampaignStatus::Active))
            }
            None => Err(DatabaseError::NotFound {
                entity: "campaign".into(),
                id: campaign_id.to_string(),
            }),
        }
    }

    async fn set_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE campaigns SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![campaign_id.to_string(), status.to_string()],
            )
            .await
            .map_err(query_err)?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "campaign".into(),
                id: campaign_id.to_string(),
            });
        }
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn ai_settings(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<CampaignAiSettings>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SETTINGS_COLUMNS} FROM campaign_ai_settings WHERE campaign_id = ?1"
                ),
                params![campaign_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_settings(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn upsert_ai_settings(
        &self,
        settings: &CampaignAiSettings,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO campaign_ai_settings ({SETTINGS_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    settings.campaign_id.to_string(),
                    settings.smart_sending_enabled as i64,
                    settings.throttle_optimization_enabled as i64,
                    settings.send_time_optimization_enabled as i64,
                    settings.ab_auto_winner_enabled as i64,
                    settings.target_metric.to_string(),
                    settings.min_throttle_rate,
                    settings.max_throttle_rate,
                    settings.current_throttle_rate,
                    settings.learning_period_days as i64,
                    settings.ab_confidence_threshold,
                    settings.ab_min_sample_size,
                    settings.complaint_rate_threshold,
                    settings.bounce_rate_threshold,
                    settings.pause_on_high_complaints as i64,
                    settings.created_at.to_rfc3339(),
                    settings.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn swap_throttle_rate(
        &self,
        campaign_id: Uuid,
        expected: i64,
        new_rate: i64,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE campaign_ai_settings \
                 SET current_throttle_rate = ?3, updated_at = ?4 \
                 WHERE campaign_id = ?1 AND current_throttle_rate = ?2",
                params![
                    campaign_id.to_string(),
                    expected,
                    new_rate,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(affected > 0)
    }

    // ── Metrics snapshots ───────────────────────────────────────────

    async fn insert_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO metrics_snapshots ({SNAPSHOT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                             ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
                ),
                params![
                    snapshot.id.to_string(),
                    snapshot.campaign_id.to_string(),
                    snapshot.interval_start.to_rfc3339(),
                    snapshot.interval_end.to_rfc3339(),
                    snapshot.sent,
                    snapshot.delivered,
                    snapshot.opened,
                    snapshot.clicked,
                    snapshot.bounced,
                    snapshot.complained,
                    snapshot.unsubscribed,
                    snapshot.total_sent,
                    snapshot.total_delivered,
                    snapshot.total_opened,
                    snapshot.total_clicked,
                    snapshot.total_bounced,
                    snapshot.total_complained,
                    snapshot.total_unsubscribed,
                    snapshot.delivery_rate,
                    snapshot.open_rate,
                    snapshot.click_rate,
                    snapshot.bounce_rate,
                    snapshot.complaint_rate,
                    snapshot.throttle_rate,
                    snapshot.throttle_utilization,
                    snapshot.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn latest_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<MetricsSnapshot>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots \
                     WHERE campaign_id = ?1 ORDER BY interval_end DESC LIMIT 1"
                ),
                params![campaign_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_snapshot(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn recent_snapshots(
        &self,
        campaign_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricsSnapshot>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots \
                     WHERE campaign_id = ?1 AND interval_end >= ?2 \
                     ORDER BY interval_end DESC"
                ),
                params![campaign_id.to_string(), since.to_rfc3339()],
            )
            .await
            .map_err(query_err)?;

        let mut snapshots = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            snapshots.push(row_to_snapshot(&row).map_err(query_err)?);
        }
        Ok(snapshots)
    }

    // ── Decision log ────────────────────────────────────────────────

    async fn insert_decision(&self, decision: &AiDecision) -> Result<(), DatabaseError> {
        let metrics_json = serde_json::to_string(&decision.metrics)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO ai_decisions ({DECISION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    decision.id.to_string(),
                    decision.campaign_id.to_string(),
                    decision.decision_type.to_string(),
                    decision.reason.clone(),
                    decision.old_value,
                    decision.new_value,
                    metrics_json,
                    decision.confidence,
                    decision.applied as i64,
                    opt_text_owned(decision.applied_at.map(|t| t.to_rfc3339())),
                    decision.reverted as i64,
                    opt_text_owned(decision.reverted_at.map(|t| t.to_rfc3339())),
                    opt_text_owned(decision.reverted_by.clone()),
                    decision.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn decisions(
        &self,
        campaign_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AiDecision>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {DECISION_COLUMNS} FROM ai_decisions \
                     WHERE campaign_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                ),
                params![campaign_id.to_string(), limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut decisions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            decisions.push(row_to_decision(&row).map_err(query_err)?);
        }
        Ok(decisions)
    }

    // ── Alerts ──────────────────────────────────────────────────────

    async fn insert_alert(&self, alert: &CampaignAlert) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO campaign_alerts ({ALERT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    alert.id.to_string(),
                    alert.campaign_id.to_string(),
                    alert.alert_type.to_string(),
                    alert.severity.to_string(),
                    alert.title.clone(),
                    alert.message.clone(),
                    alert.threshold_value,
                    alert.actual_value,
                    alert.acknowledged as i64,
                    opt_text_owned(alert.acknowledged_by.clone()),
                    opt_text_owned(alert.acknowledged_at.map(|t| t.to_rfc3339())),
                    alert.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn alert(&self, alert_id: Uuid) -> Result<Option<CampaignAlert>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ALERT_COLUMNS} FROM campaign_alerts WHERE id = ?1"),
                params![alert_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_alert(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn alerts(&self, campaign_id: Uuid) -> Result<Vec<CampaignAlert>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM campaign_alerts \
                     WHERE campaign_id = ?1 ORDER BY created_at DESC"
                ),
                params![campaign_id.to_string()],
            )
            .await
            .map_err(query_err)?;

        let mut alerts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            alerts.push(row_to_alert(&row).map_err(query_err)?);
        }
        Ok(alerts)
    }

    async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        acknowledged_by: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        // The acknowledged guard makes repeat acknowledgment a no-op.
        let affected = self
            .conn()
            .execute(
                "UPDATE campaign_alerts \
                 SET acknowledged = 1, acknowledged_by = ?2, acknowledged_at = ?3 \
                 WHERE id = ?1 AND acknowledged = 0",
                params![
                    alert_id.to_string(),
                    acknowledged_by,
                    acknowledged_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(affected > 0)
    }

    // ── Inbox profiles ──────────────────────────────────────────────

    async fn inbox_profile(
        &self,
        address_hash: &str,
    ) -> Result<Option<InboxProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM inbox_profiles WHERE address_hash = ?1"),
                params![address_hash],
            )
            .await
            .map_err(query_err)?;

        let mut profile = match rows.next().await.map_err(query_err)? {
            Some(row) => row_to_profile(&row).map_err(query_err)?,
            None => return Ok(None),
        };

        let mut hours = self
            .conn()
            .query(
                "SELECT hour, opens FROM profile_hourly_opens WHERE address_hash = ?1",
                params![address_hash],
            )
            .await
            .map_err(query_err)?;
        while let Ok(Some(row)) = hours.next().await {
            let hour: i64 = row.get(0).map_err(query_err)?;
            let opens: i64 = row.get(1).map_err(query_err)?;
            if (0..24).contains(&hour) {
                profile.hourly_opens[hour as usize] = opens as u32;
            }
        }

        let mut days = self
            .conn()
            .query(
                "SELECT weekday, opens FROM profile_daily_opens WHERE address_hash = ?1",
                params![address_hash],
            )
            .await
            .map_err(query_err)?;
        while let Ok(Some(row)) = days.next().await {
            let weekday: i64 = row.get(0).map_err(query_err)?;
            let opens: i64 = row.get(1).map_err(query_err)?;
            if (0..7).contains(&weekday) {
                profile.daily_opens[weekday as usize] = opens as u32;
            }
        }

        Ok(Some(profile))
    }

    async fn apply_profile_event(
        &self,
        address_hash: &str,
        domain: &str,
        event: EventType,
        event_time: DateTime<Utc>,
        open_step: f64,
        bounce_step: f64,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let at = event_time.to_rfc3339();

        // Upsert the row first, then mutate in place with additive
        // expressions — concurrent updates interleave without lost writes.
        conn.execute(
            "INSERT INTO inbox_profiles (address_hash, email_domain, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(address_hash) DO NOTHING",
            params![address_hash, domain, at.clone()],
        )
        .await
        .map_err(query_err)?;

        match event {
            EventType::Sent => {
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        total_sent = total_sent + 1, \
                        last_sent_at = ?2, \
                        updated_at = ?2 \
                     WHERE address_hash = ?1",
                    params![address_hash, at],
                )
                .await
                .map_err(query_err)?;
            }
            EventType::Open => {
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        engagement_prev = engagement_score, \
                        engagement_score = min(1.0, engagement_score + ?2), \
                        avg_open_delay_minutes = CASE \
                            WHEN last_sent_at IS NOT NULL THEN \
                                ((avg_open_delay_minutes * total_opens) \
                                 + max(0.0, (julianday(?3) - julianday(last_sent_at)) * 1440.0)) \
                                / (total_opens + 1) \
                            ELSE avg_open_delay_minutes \
                        END, \
                        total_opens = total_opens + 1, \
                        last_event_at = ?3, \
                        updated_at = ?3 \
                     WHERE address_hash = ?1",
                    params![address_hash, open_step, at.clone()],
                )
                .await
                .map_err(query_err)?;

                let hour = event_time.hour() as i64;
                conn.execute(
                    "INSERT INTO profile_hourly_opens (address_hash, hour, opens) VALUES (?1, ?2, 1) \
                     ON CONFLICT(address_hash, hour) DO UPDATE SET opens = opens + 1",
                    params![address_hash, hour],
                )
                .await
                .map_err(query_err)?;

                let weekday = event_time.weekday().num_days_from_monday() as i64;
                conn.execute(
                    "INSERT INTO profile_daily_opens (address_hash, weekday, opens) VALUES (?1, ?2, 1) \
                     ON CONFLICT(address_hash, weekday) DO UPDATE SET opens = opens + 1",
                    params![address_hash, weekday],
                )
                .await
                .map_err(query_err)?;

                // Refresh the derived optimal hour from the histogram.
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        optimal_hour = (SELECT hour FROM profile_hourly_opens \
                                        WHERE address_hash = ?1 \
                                        ORDER BY opens DESC, hour ASC LIMIT 1), \
                        optimal_hour_confidence = COALESCE( \
                            CAST((SELECT MAX(opens) FROM profile_hourly_opens \
                                  WHERE address_hash = ?1) AS REAL) \
                            / CAST(max(total_opens, 1) AS REAL), 0.0) \
                     WHERE address_hash = ?1",
                    params![address_hash],
                )
                .await
                .map_err(query_err)?;
            }
            EventType::Click => {
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        engagement_prev = engagement_score, \
                        engagement_score = min(1.0, engagement_score + ?2), \
                        avg_click_delay_minutes = CASE \
                            WHEN last_sent_at IS NOT NULL THEN \
                                ((avg_click_delay_minutes * total_clicks) \
                                 + max(0.0, (julianday(?3) - julianday(last_sent_at)) * 1440.0)) \
                                / (total_clicks + 1) \
                            ELSE avg_click_delay_minutes \
                        END, \
                        total_clicks = total_clicks + 1, \
                        last_event_at = ?3, \
                        updated_at = ?3 \
                     WHERE address_hash = ?1",
                    params![address_hash, open_step, at],
                )
                .await
                .map_err(query_err)?;
            }
            EventType::Bounce => {
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        engagement_prev = engagement_score, \
                        engagement_score = max(0.0, engagement_score - ?2), \
                        total_bounces = total_bounces + 1, \
                        last_event_at = ?3, \
                        updated_at = ?3 \
                     WHERE address_hash = ?1",
                    params![address_hash, bounce_step, at],
                )
                .await
                .map_err(query_err)?;
            }
            EventType::Complaint => {
                // Trust collapses instantly on complaint.
                conn.execute(
                    "UPDATE inbox_profiles SET \
                        engagement_prev = engagement_score, \
                        engagement_score = 0.0, \
                        total_complaints = total_complaints + 1, \
                        last_event_at = ?2, \
                        updated_at = ?2 \
                     WHERE address_hash = ?1",
                    params![address_hash, at],
                )
                .await
                .map_err(query_err)?;
            }
        }

        Ok(())
    }

    // ── Domain aggregates ───────────────────────────────────────────

    async fn domain_send_time(
        &self,
        domain: &str,
    ) -> Result<Option<DomainSendTime>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT domain, optimal_hours, sample_size, updated_at \
                 FROM domain_send_times WHERE domain = ?1",
                params![domain],
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let hours_json: String = row.get(1).map_err(query_err)?;
                let updated_str: String = row.get(3).map_err(query_err)?;
                Ok(Some(DomainSendTime {
                    domain: row.get(0).map_err(query_err)?,
                    optimal_hours: serde_json::from_str(&hours_json).unwrap_or_default(),
                    sample_size: row.get(2).map_err(query_err)?,
                    updated_at: parse_datetime(&updated_str),
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_domain_send_time(
        &self,
        send_time: &DomainSendTime,
    ) -> Result<(), DatabaseError> {
        let hours_json = serde_json::to_string(&send_time.optimal_hours)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO domain_send_times (domain, optimal_hours, sample_size, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(domain) DO UPDATE SET \
                    optimal_hours = excluded.optimal_hours, \
                    sample_size = excluded.sample_size, \
                    updated_at = excluded.updated_at",
                params![
                    send_time.domain.clone(),
                    hours_json,
                    send_time.sample_size,
                    send_time.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}
