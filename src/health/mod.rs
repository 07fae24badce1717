//! Campaign health scoring — derived on demand, never persisted.

pub mod model;
pub mod scorer;

pub use model::{CampaignHealthScore, HealthTrends, Trend};
pub use scorer::score;
