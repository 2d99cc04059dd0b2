//! Per-record disposition.
//!
//! Exactly one disposition applies to every record. "Needs attention" is a
//! sub-state of [`Disposition::Pending`] and is checked separately because it
//! depends on the reference time.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::config::StatusRule;
use crate::models::CaseRecord;

/// Status fragment marking a rejected application (case-insensitive).
pub const NOT_PASSED_MARKER: &str = "not passed";

/// Terminal status of a review (case-insensitive).
pub const REVIEW_COMPLETED_STATUS: &str = "completed";

/// Open status used by the legacy report.
pub const LEGACY_PENDING_STATUS: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Converted,
    NotPassed,
    Pending,
    /// Matches no rule, e.g. a free-text status with no completion time.
    Unresolved,
}

pub fn classify(record: &CaseRecord, rule: StatusRule) -> Disposition {
    let status = record.status.trim().to_lowercase();
    let completed = record.is_completed();

    match rule {
        StatusRule::Application => {
            if status.contains(NOT_PASSED_MARKER) {
                Disposition::NotPassed
            } else if completed && !status.is_empty() {
                Disposition::Converted
            } else if !completed && status.is_empty() {
                Disposition::Pending
            } else {
                Disposition::Unresolved
            }
        }
        StatusRule::Legacy => {
            let open_status = status.is_empty() || status == LEGACY_PENDING_STATUS;
            if completed && !open_status {
                Disposition::Converted
            } else if !completed && open_status {
                Disposition::Pending
            } else {
                Disposition::Unresolved
            }
        }
        StatusRule::Review => {
            let is_done = status == REVIEW_COMPLETED_STATUS;
            match (is_done, completed) {
                (true, true) => Disposition::Converted,
                (false, false) => Disposition::Pending,
                _ => Disposition::Unresolved,
            }
        }
    }
}

impl Disposition {
    /// A pending record that has been open longer than `stale_after`.
    pub fn needs_attention(
        self,
        record: &CaseRecord,
        stale_after: TimeDelta,
        now: DateTime<Utc>,
    ) -> bool {
        self == Disposition::Pending && record.age(now) > stale_after
    }
}
