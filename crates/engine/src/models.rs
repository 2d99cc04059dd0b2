use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One case as seen by the aggregation engine.
///
/// Both App-In applications and CA Final reviews are mapped into this shape;
/// reviews leave `product` and `category` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub number: String,
    pub display_name: String,
    pub product: String,
    pub category: String,
    pub executor: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CaseRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Time from creation to completion, `None` while the case is open.
    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.completed_at.map(|done| done - self.created_at)
    }

    /// Time the case has been open as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.created_at
    }

    /// Trimmed performer name; empty means unassigned.
    pub fn executor_key(&self) -> &str {
        self.executor.trim()
    }
}
