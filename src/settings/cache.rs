//! Read-through settings cache.
//!
//! A plain map behind a reader/writer lock — read-heavy, short critical
//! sections. The lock is never held across a store read, so a miss for one
//! campaign never blocks lookups for others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::settings::model::CampaignAiSettings;

/// In-process cache of per-campaign settings, invalidated on write.
#[derive(Default)]
pub struct SettingsCache {
    inner: RwLock<HashMap<Uuid, Arc<CampaignAiSettings>>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached entry.
    pub async fn get(&self, campaign_id: Uuid) -> Option<Arc<CampaignAiSettings>> {
        self.inner.read().await.get(&campaign_id).cloned()
    }

    /// Insert or replace an entry.
    pub async fn put(&self, campaign_id: Uuid, settings: Arc<CampaignAiSettings>) {
        self.inner.write().await.insert(campaign_id, settings);
    }

    /// Drop a campaign's entry (after any write that affects it).
    pub async fn invalidate(&self, campaign_id: Uuid) {
        self.inner.write().await.remove(&campaign_id);
    }

    /// Number of cached campaigns.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
