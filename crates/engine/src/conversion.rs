use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::classify::{classify, Disposition};
use crate::config::StreamRules;
use crate::models::CaseRecord;

/// Aggregate counts, rates and timings for a set of records.
///
/// Durations are whole seconds. Only converted records contribute elapsed
/// time, but the average divides by every processed record.
/// `best_time_secs` is `None` when no converted record clears the best-time
/// floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSummary {
    pub total: u64,
    pub converted: u64,
    pub not_passed: u64,
    pub pending: u64,
    pub unresolved: u64,
    pub need_attention: u64,
    pub fastest: u64,
    pub fastest_percent: f64,
    pub rate: f64,
    pub average_time_secs: i64,
    pub best_time_secs: Option<i64>,
}

/// Reduce `records` to a [`ConversionSummary`] in one pass.
pub fn summarize(
    records: &[&CaseRecord],
    rules: &StreamRules,
    now: DateTime<Utc>,
) -> ConversionSummary {
    let profile = &rules.profile;

    let mut converted = 0u64;
    let mut not_passed = 0u64;
    let mut pending = 0u64;
    let mut unresolved = 0u64;
    let mut need_attention = 0u64;
    let mut fastest = 0u64;
    let mut elapsed_ms = 0i64;
    let mut best: Option<TimeDelta> = None;

    for record in records {
        let disposition = classify(record, profile.status_rule);
        match disposition {
            Disposition::Converted => {
                converted += 1;
                // Converted implies a completion timestamp.
                if let Some(elapsed) = record.elapsed() {
                    elapsed_ms += elapsed.num_milliseconds();

                    if elapsed <= profile.speed_threshold {
                        fastest += 1;
                    }
                    if elapsed >= rules.best_time_floor && best.is_none_or(|b| elapsed < b) {
                        best = Some(elapsed);
                    }
                }
            }
            Disposition::NotPassed => not_passed += 1,
            Disposition::Pending => {
                pending += 1;
                if disposition.needs_attention(record, rules.stale_after, now) {
                    need_attention += 1;
                }
            }
            Disposition::Unresolved => unresolved += 1,
        }
    }

    let total = records.len() as u64;
    let processed = profile.processed(converted, not_passed);

    let average_time_secs = if processed > 0 {
        elapsed_ms / processed as i64 / 1000
    } else {
        0
    };

    ConversionSummary {
        total,
        converted,
        not_passed,
        pending,
        unresolved,
        need_attention,
        fastest,
        fastest_percent: percent(fastest, processed),
        rate: percent(processed, total),
        average_time_secs,
        best_time_secs: best.map(|b| b.num_seconds()),
    }
}

/// `part / whole` as a 0–100 percentage; 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}
