//! Inbox profile and send-time models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::Trend;

/// Per-recipient engagement profile, keyed by address hash.
///
/// Updated incrementally per event — never recomputed wholesale. The
/// histograms are fixed-size so their shape is a compile-time guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxProfile {
    /// Hex SHA-256 of the normalized address. The raw address is never stored.
    pub address_hash: String,
    /// Domain of the address, for domain-level aggregation.
    pub email_domain: String,
    /// Hour of day (UTC) with the most opens, once any exist.
    pub optimal_hour: Option<u8>,
    /// Share of opens that fall in the optimal hour.
    pub optimal_hour_confidence: f64,
    pub avg_open_delay_minutes: f64,
    pub avg_click_delay_minutes: f64,
    /// Bounded [0, 1] affinity measure. Builds slowly, collapses on complaint.
    pub engagement_score: f64,
    pub engagement_trend: Trend,
    pub total_sent: i64,
    pub total_opens: i64,
    pub total_clicks: i64,
    pub total_bounces: i64,
    pub total_complaints: i64,
    /// Opens bucketed by UTC hour of day.
    pub hourly_opens: [u32; 24],
    /// Opens bucketed by weekday (Monday = 0).
    pub daily_opens: [u32; 7],
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-domain optimal-hour aggregate. Computed by an external statistics
/// job; read-only input here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSendTime {
    pub domain: String,
    /// Best hours in preference order, as parsed by the external job.
    pub optimal_hours: Vec<u8>,
    pub sample_size: i64,
    pub updated_at: DateTime<Utc>,
}

/// Which fallback tier produced a send-time answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendTimeSource {
    /// The recipient's own profile.
    Profile,
    /// Domain-level aggregate.
    Domain,
    /// Global default hour.
    Default,
}

/// Resolved best send hour for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTimeRecommendation {
    /// Hour of day, UTC.
    pub hour: u8,
    pub confidence: f64,
    pub source: SendTimeSource,
}
