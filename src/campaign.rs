//! Campaign-management-owned inputs.
//!
//! Campaign lifecycle and cumulative counters belong to the campaign
//! management collaborator. This core reads the counters when recording
//! snapshots and flips status to `Paused` when the policy demands it —
//! nothing else here mutates campaign state.

use serde::{Deserialize, Serialize};

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
    Completed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown campaign status: {}", s)),
        }
    }
}

/// Cumulative-to-date campaign counters.
///
/// Monotonically increasing in normal operation; the metrics aggregator
/// tolerates resets by flooring interval deltas at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCounters {
    pub sent: i64,
    pub delivered: i64,
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub complained: i64,
    pub unsubscribed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_and_fromstr() {
        assert_eq!(CampaignStatus::Paused.to_string(), "paused");
        assert_eq!(
            "active".parse::<CampaignStatus>().unwrap(),
            CampaignStatus::Active
        );
        assert!("archived".parse::<CampaignStatus>().is_err());
    }
}
