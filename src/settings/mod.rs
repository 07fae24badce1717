//! Per-campaign adaptive-sending settings — model, cache, and service.

pub mod cache;
pub mod model;
pub mod service;

pub use cache::SettingsCache;
pub use model::{CampaignAiSettings, SettingsUpdate, TargetMetric};
pub use service::SettingsService;
