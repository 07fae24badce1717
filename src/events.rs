//! Normalized tracking events consumed by the controller.
//!
//! Events arrive pre-parsed from the pixel-tracking and webhook ingestion
//! collaborators. The controller never sees raw ESP payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of delivery/engagement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A message left the sending pipeline for this recipient.
    Sent,
    /// Recipient opened the message.
    Open,
    /// Recipient clicked a link.
    Click,
    /// The message bounced.
    Bounce,
    /// Recipient filed a spam complaint.
    Complaint,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Open => write!(f, "open"),
            Self::Click => write!(f, "click"),
            Self::Bounce => write!(f, "bounce"),
            Self::Complaint => write!(f, "complaint"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "open" => Ok(Self::Open),
            "click" => Ok(Self::Click),
            "bounce" => Ok(Self::Bounce),
            "complaint" => Ok(Self::Complaint),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

impl EventType {
    /// Whether this event can indicate reputation risk.
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::Bounce | Self::Complaint)
    }
}

/// A normalized tracking event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Campaign the event belongs to.
    pub campaign_id: Uuid,
    /// Event kind.
    pub event_type: EventType,
    /// Raw recipient address — transient, never persisted as-is.
    pub recipient: String,
    /// When the event occurred at the recipient's provider.
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_display_and_fromstr() {
        assert_eq!(EventType::Complaint.to_string(), "complaint");
        assert_eq!("open".parse::<EventType>().unwrap(), EventType::Open);
        assert!("delivered".parse::<EventType>().is_err());
    }

    #[test]
    fn negative_events() {
        assert!(EventType::Bounce.is_negative());
        assert!(EventType::Complaint.is_negative());
        assert!(!EventType::Open.is_negative());
        assert!(!EventType::Sent.is_negative());
    }
}
