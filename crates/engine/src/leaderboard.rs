use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bucket::{converted_histogram, TimeInterval};
use crate::config::StreamRules;
use crate::conversion::{summarize, ConversionSummary};
use crate::models::CaseRecord;

/// Per-performer aggregate, only alive while an overview is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformerMetric {
    pub display_name: String,
    pub conversion: ConversionSummary,
    pub performances: Vec<TimeInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub display_name: String,
    pub total: u64,
    pub converted: u64,
    pub not_passed: u64,
    pub conversion_rate: f64,
    pub average_time_secs: i64,
    pub best_time_secs: Option<i64>,
    pub performances: Vec<TimeInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub display_name: String,
    pub converted: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestTimePerformer {
    pub display_name: String,
    pub best_time_secs: i64,
}

pub fn performer_metrics(
    groups: &BTreeMap<&str, Vec<&CaseRecord>>,
    rules: &StreamRules,
    now: DateTime<Utc>,
) -> Vec<PerformerMetric> {
    groups
        .iter()
        .map(|(executor, records)| PerformerMetric {
            display_name: (*executor).to_string(),
            conversion: summarize(records, rules, now),
            performances: converted_histogram(records, rules),
        })
        .collect()
}

/// Converted count descending, then rate descending, then average time
/// ascending.
pub fn compare_performance(a: &ConversionSummary, b: &ConversionSummary) -> Ordering {
    b.converted
        .cmp(&a.converted)
        .then_with(|| b.rate.total_cmp(&a.rate))
        .then_with(|| a.average_time_secs.cmp(&b.average_time_secs))
}

fn ranked(metrics: &[PerformerMetric]) -> Vec<&PerformerMetric> {
    let mut sorted: Vec<&PerformerMetric> = metrics.iter().collect();
    sorted.sort_by(|a, b| {
        compare_performance(&a.conversion, &b.conversion)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    sorted
}

/// Top `size` performers with dense 1-based ranks.
pub fn rank_performers(metrics: &[PerformerMetric], size: usize) -> Vec<LeaderboardEntry> {
    ranked(metrics)
        .into_iter()
        .take(size)
        .enumerate()
        .map(|(i, m)| LeaderboardEntry {
            rank: (i + 1) as u32,
            display_name: m.display_name.clone(),
            total: m.conversion.total,
            converted: m.conversion.converted,
            not_passed: m.conversion.not_passed,
            conversion_rate: m.conversion.rate,
            average_time_secs: m.conversion.average_time_secs,
            best_time_secs: m.conversion.best_time_secs,
            performances: m.performances.clone(),
        })
        .collect()
}

/// Leader by converted count and rate. `None` when nobody converted or
/// processed anything.
pub fn top_performer(metrics: &[PerformerMetric]) -> Option<TopPerformer> {
    ranked(metrics)
        .into_iter()
        .next()
        .filter(|m| m.conversion.converted > 0 || m.conversion.rate > 0.0)
        .map(|m| TopPerformer {
            display_name: m.display_name.clone(),
            converted: m.conversion.converted,
            conversion_rate: m.conversion.rate,
        })
}

/// Performer with the smallest best time; ties go to the first name.
pub fn best_time_performer(metrics: &[PerformerMetric]) -> Option<BestTimePerformer> {
    metrics
        .iter()
        .filter_map(|m| {
            m.conversion
                .best_time_secs
                .filter(|secs| *secs > 0)
                .map(|secs| (secs, m.display_name.as_str()))
        })
        .min()
        .map(|(best_time_secs, name)| BestTimePerformer {
            display_name: name.to_string(),
            best_time_secs,
        })
}
