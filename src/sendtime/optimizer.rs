//! Send-time resolution and profile updates.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::try_join_all;
use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::{Result, ValidationError};
use crate::events::EventType;
use crate::sendtime::model::{SendTimeRecommendation, SendTimeSource};
use crate::sendtime::recipient::RecipientKey;
use crate::store::Store;

/// Confidence attached to a domain-aggregate answer.
const DOMAIN_CONFIDENCE: f64 = 0.7;
/// Confidence attached to the global default hour.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Resolves optimal send hours and applies streaming profile updates.
pub struct SendTimeOptimizer {
    store: Arc<dyn Store>,
    config: ControllerConfig,
}

impl SendTimeOptimizer {
    pub fn new(store: Arc<dyn Store>, config: ControllerConfig) -> Self {
        Self { store, config }
    }

    /// Resolve the best send hour for one recipient.
    ///
    /// Tiers, first confident answer wins:
    /// 1. the recipient's own profile, trusted only past a minimum open count;
    /// 2. the domain aggregate, if the external job parsed at least one hour;
    /// 3. the global default hour.
    pub async fn optimal_send_time(&self, recipient: &str) -> Result<SendTimeRecommendation> {
        let key = RecipientKey::parse(recipient)?;

        if let Some(profile) = self.store.inbox_profile(&key.address_hash).await? {
            if profile.total_opens >= self.config.min_profile_opens {
                if let Some(hour) = profile.optimal_hour {
                    return Ok(SendTimeRecommendation {
                        hour,
                        confidence: profile.optimal_hour_confidence,
                        source: SendTimeSource::Profile,
                    });
                }
            }
        }

        if let Some(domain_time) = self.store.domain_send_time(&key.domain).await? {
            if let Some(&hour) = domain_time.optimal_hours.first() {
                debug!(domain = %key.domain, hour, "Falling back to domain aggregate");
                return Ok(SendTimeRecommendation {
                    hour,
                    confidence: DOMAIN_CONFIDENCE,
                    source: SendTimeSource::Domain,
                });
            }
        }

        Ok(SendTimeRecommendation {
            hour: self.config.default_send_hour,
            confidence: DEFAULT_CONFIDENCE,
            source: SendTimeSource::Default,
        })
    }

    /// Resolve many recipients, preserving input order.
    pub async fn optimal_send_times(
        &self,
        recipients: &[String],
    ) -> Result<Vec<SendTimeRecommendation>> {
        try_join_all(recipients.iter().map(|r| self.optimal_send_time(r))).await
    }

    /// Next future UTC instant at the given hour — today if not yet passed,
    /// otherwise tomorrow. Never a past instant.
    pub fn next_occurrence(&self, hour: u8) -> Result<DateTime<Utc>> {
        Ok(next_occurrence_after(hour, Utc::now())?)
    }

    /// Apply one tracking event to the recipient's profile.
    ///
    /// The write is an upsert followed by atomic in-place increments, so
    /// concurrent updates to the same recipient interleave safely.
    pub async fn update_profile(
        &self,
        recipient: &str,
        event_type: EventType,
        event_time: DateTime<Utc>,
    ) -> Result<()> {
        let key = RecipientKey::parse(recipient)?;
        self.store
            .apply_profile_event(
                &key.address_hash,
                &key.domain,
                event_type,
                event_time,
                self.config.engagement_open_step,
                self.config.engagement_bounce_step,
            )
            .await?;
        Ok(())
    }
}

/// Pure form of `next_occurrence` for a fixed `now`.
pub fn next_occurrence_after(
    hour: u8,
    now: DateTime<Utc>,
) -> std::result::Result<DateTime<Utc>, ValidationError> {
    if hour > 23 {
        return Err(ValidationError::HourOutOfRange(hour));
    }
    let naive = now
        .date_naive()
        .and_hms_opt(hour as u32, 0, 0)
        .ok_or(ValidationError::HourOutOfRange(hour))?;
    let candidate = Utc.from_utc_datetime(&naive);
    if candidate > now {
        Ok(candidate)
    } else {
        Ok(candidate + Duration::days(1))
    }
}
