//! Settings service — get-or-default reads, merge-upsert writes.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::settings::cache::SettingsCache;
use crate::settings::model::{CampaignAiSettings, SettingsUpdate};
use crate::store::Store;

/// Cached access to per-campaign settings.
///
/// `get` never fails with not-found: a campaign without a persisted row
/// resolves to `CampaignAiSettings::defaults_for`. A successful save
/// invalidates that campaign's cache entry.
pub struct SettingsService {
    store: Arc<dyn Store>,
    cache: SettingsCache,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: SettingsCache::new(),
        }
    }

    /// Get settings for a campaign, falling back to defaults.
    pub async fn get(&self, campaign_id: Uuid) -> Result<Arc<CampaignAiSettings>, DatabaseError> {
        if let Some(cached) = self.cache.get(campaign_id).await {
            return Ok(cached);
        }

        let settings = match self.store.ai_settings(campaign_id).await? {
            Some(s) => s,
            None => {
                // Created lazily: persist the defaults so later rate swaps
                // have a row to compare against.
                let defaults = CampaignAiSettings::defaults_for(campaign_id);
                self.store.upsert_ai_settings(&defaults).await?;
                debug!(campaign_id = %campaign_id, "No settings row, persisted defaults");
                defaults
            }
        };

        let settings = Arc::new(settings);
        self.cache.put(campaign_id, Arc::clone(&settings)).await;
        Ok(settings)
    }

    /// Merge an operator update onto existing-or-default settings and upsert.
    pub async fn save(
        &self,
        campaign_id: Uuid,
        update: &SettingsUpdate,
    ) -> Result<CampaignAiSettings, DatabaseError> {
        let mut settings = self
            .store
            .ai_settings(campaign_id)
            .await?
            .unwrap_or_else(|| CampaignAiSettings::defaults_for(campaign_id));

        settings.merge(update);
        self.store.upsert_ai_settings(&settings).await?;
        self.cache.invalidate(campaign_id).await;

        debug!(campaign_id = %campaign_id, "Settings saved, cache invalidated");
        Ok(settings)
    }

    /// Drop a campaign's cache entry after an out-of-band settings write.
    pub async fn invalidate(&self, campaign_id: Uuid) {
        self.cache.invalidate(campaign_id).await;
    }
}
