//! Duration buckets used by every histogram in the overview.
//!
//! Buckets are half-open `[lower, upper)` ranges checked from the smallest
//! threshold upward; anything past the last threshold lands in `5h+`.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{classify, Disposition};
use crate::config::StreamRules;
use crate::models::CaseRecord;

/// Thresholds (in minutes) and titles for the seven-bucket layout.
const STANDARD_BUCKETS: &[(&str, i64)] = &[
    ("<30min", 30),
    ("<1h", 60),
    ("<2h", 120),
    ("<3h", 180),
    ("<4h", 240),
    ("<5h", 300),
];

/// The legacy report shape has no sub-hour split.
const LEGACY_BUCKETS: &[(&str, i64)] = &[
    ("<1h", 60),
    ("<2h", 120),
    ("<3h", 180),
    ("<4h", 240),
    ("<5h", 300),
];

const OVERFLOW_TITLE: &str = "5h+";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSet {
    Standard,
    Legacy,
}

impl BucketSet {
    fn bounded(self) -> &'static [(&'static str, i64)] {
        match self {
            Self::Standard => STANDARD_BUCKETS,
            Self::Legacy => LEGACY_BUCKETS,
        }
    }

    /// Number of buckets, including the terminal one.
    pub fn bucket_count(self) -> usize {
        self.bounded().len() + 1
    }

    pub fn titles(self) -> Vec<&'static str> {
        self.bounded()
            .iter()
            .map(|(title, _)| *title)
            .chain(std::iter::once(OVERFLOW_TITLE))
            .collect()
    }

    /// Position of the bucket that holds `elapsed`.
    pub fn index_of(self, elapsed: TimeDelta) -> usize {
        self.bounded()
            .iter()
            .position(|(_, upper)| elapsed < TimeDelta::minutes(*upper))
            .unwrap_or(self.bounded().len())
    }

    /// Count durations into every bucket, keeping empty buckets.
    pub fn histogram<I>(self, durations: I) -> Vec<TimeInterval>
    where
        I: IntoIterator<Item = TimeDelta>,
    {
        let mut counts = vec![0u64; self.bucket_count()];
        for elapsed in durations {
            counts[self.index_of(elapsed)] += 1;
        }

        self.titles()
            .into_iter()
            .zip(counts)
            .map(|(title, total)| TimeInterval {
                title: title.to_string(),
                total,
            })
            .collect()
    }
}

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub title: String,
    pub total: u64,
}

/// Creation-to-completion time of every converted record.
pub fn converted_histogram(records: &[&CaseRecord], rules: &StreamRules) -> Vec<TimeInterval> {
    rules.profile.buckets.histogram(
        records
            .iter()
            .filter(|r| classify(r, rules.profile.status_rule) == Disposition::Converted)
            .filter_map(|r| r.elapsed()),
    )
}

/// Age of every pending record relative to `now`.
pub fn pending_histogram(
    records: &[&CaseRecord],
    rules: &StreamRules,
    now: DateTime<Utc>,
) -> Vec<TimeInterval> {
    rules.profile.buckets.histogram(
        records
            .iter()
            .filter(|r| classify(r, rules.profile.status_rule) == Disposition::Pending)
            .map(|r| r.age(now)),
    )
}

/// Title of the bucket holding the most records; the earliest bucket wins a tie.
/// `None` when every bucket is empty.
pub fn busiest_slot(intervals: &[TimeInterval]) -> Option<String> {
    let mut best: Option<&TimeInterval> = None;
    for interval in intervals {
        if interval.total > best.map_or(0, |b| b.total) {
            best = Some(interval);
        }
    }
    best.map(|b| b.title.clone())
}
