use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bucket::{busiest_slot, converted_histogram, pending_histogram, TimeInterval};
use crate::config::{EngineConfig, StreamRules};
use crate::conversion::{summarize, ConversionSummary};
use crate::group::{group_by_executor, group_by_product};
use crate::leaderboard::{
    best_time_performer, compare_performance, performer_metrics, rank_performers, top_performer,
    BestTimePerformer, LeaderboardEntry, TopPerformer,
};
use crate::models::CaseRecord;

/// The performance report for one record stream.
///
/// `ca_final` holds the review-stream report when one was supplied;
/// `product_metrics` is only computed for applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub active_executor: u64,
    pub best_time_slot: Option<String>,
    pub top_performer: Option<TopPerformer>,
    pub best_time_performer: Option<BestTimePerformer>,
    pub conversion: ConversionSummary,
    pub time_intervals_by_converted: Vec<TimeInterval>,
    pub time_intervals_by_pending: Vec<TimeInterval>,
    pub leaderboards: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_metrics: Option<Vec<ProductMetric>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_final: Option<Box<Overview>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetric {
    pub name: String,
    #[serde(flatten)]
    pub conversion: ConversionSummary,
}

/// Build the overview for the application stream and, when given, the
/// review stream nested under it.
pub fn build_overview(
    applications: &[CaseRecord],
    reviews: Option<&[CaseRecord]>,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Overview {
    let mut overview = stream_overview(applications, &config.application_rules(), config, now);
    overview.product_metrics = Some(product_metrics(
        applications,
        &config.application_rules(),
        config,
        now,
    ));
    overview.ca_final = reviews.map(|records| {
        Box::new(stream_overview(records, &config.review_rules(), config, now))
    });

    tracing::debug!(
        applications = applications.len(),
        reviews = reviews.map(<[CaseRecord]>::len),
        active_executor = overview.active_executor,
        "overview built"
    );

    overview
}

fn stream_overview(
    records: &[CaseRecord],
    rules: &StreamRules,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Overview {
    let groups = group_by_executor(records);
    let performers = performer_metrics(&groups, rules, now);

    let all: Vec<&CaseRecord> = records.iter().collect();
    let converted_intervals = converted_histogram(&all, rules);

    Overview {
        active_executor: groups.len() as u64,
        best_time_slot: busiest_slot(&converted_intervals),
        top_performer: top_performer(&performers),
        best_time_performer: best_time_performer(&performers),
        conversion: summarize(&all, rules, now),
        time_intervals_by_converted: converted_intervals,
        time_intervals_by_pending: pending_histogram(&all, rules, now),
        leaderboards: rank_performers(&performers, config.leaderboard_size),
        product_metrics: None,
        ca_final: None,
    }
}

fn product_metrics(
    records: &[CaseRecord],
    rules: &StreamRules,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<ProductMetric> {
    let mut products: Vec<ProductMetric> = group_by_product(records, &config.product_aliases)
        .into_iter()
        .map(|(name, group)| ProductMetric {
            conversion: summarize(&group, rules, now),
            name,
        })
        .collect();

    products.sort_by(|a, b| {
        compare_performance(&a.conversion, &b.conversion).then_with(|| a.name.cmp(&b.name))
    });
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{done, now, open, with_product};
    use chrono::TimeDelta;

    #[test]
    fn empty_input_yields_zeroed_overview() {
        let o = build_overview(&[], None, &EngineConfig::default(), now());
        assert_eq!(o.active_executor, 0);
        assert_eq!(o.conversion.total, 0);
        assert_eq!(o.conversion.rate, 0.0);
        assert!(o.leaderboards.is_empty());
        assert_eq!(o.top_performer, None);
        assert_eq!(o.best_time_performer, None);
        assert_eq!(o.best_time_slot, None);
        assert_eq!(o.time_intervals_by_converted.len(), 7);
        assert_eq!(o.time_intervals_by_pending.len(), 7);
        assert!(o.time_intervals_by_converted.iter().all(|b| b.total == 0));
        assert!(o.time_intervals_by_pending.iter().all(|b| b.total == 0));
        assert_eq!(o.product_metrics, Some(Vec::new()));
        assert!(o.ca_final.is_none());
    }

    #[test]
    fn two_performer_scenario() {
        let records = vec![
            done("A", "Approved", 10),
            done("A", "Approved", 40),
            open("A", "Not Passed", 30),
            done("B", "Approved", 20),
        ];
        let o = build_overview(&records, None, &EngineConfig::default(), now());

        assert_eq!(o.active_executor, 2);
        assert_eq!(o.leaderboards.len(), 2);

        let a = &o.leaderboards[0];
        assert_eq!(a.display_name, "A");
        assert_eq!(a.rank, 1);
        assert_eq!(a.converted, 2);
        assert_eq!(a.not_passed, 1);
        assert!((a.conversion_rate - 100.0).abs() < 1e-9);

        let b = &o.leaderboards[1];
        assert_eq!(b.display_name, "B");
        assert_eq!(b.rank, 2);
        assert_eq!(b.converted, 1);
        assert!((b.conversion_rate - 100.0).abs() < 1e-9);

        let best = o.best_time_performer.expect("best time performer");
        assert_eq!(best.display_name, "A");
        assert_eq!(best.best_time_secs, 600);

        assert_eq!(o.top_performer.map(|t| t.display_name).as_deref(), Some("A"));
    }

    #[test]
    fn unassigned_records_count_only_in_totals() {
        let records = vec![done("", "Approved", 5), done("A", "Approved", 50)];
        let o = build_overview(&records, None, &EngineConfig::default(), now());
        assert_eq!(o.conversion.total, 2);
        assert_eq!(o.conversion.converted, 2);
        assert_eq!(o.active_executor, 1);
        assert_eq!(o.leaderboards.len(), 1);
        assert_eq!(o.leaderboards[0].display_name, "A");
        // the unassigned 5-minute case would otherwise win best time
        assert_eq!(o.best_time_performer.unwrap().best_time_secs, 3000);
    }

    #[test]
    fn histograms_sum_to_matching_records() {
        let records = vec![
            done("A", "Approved", 10),
            done("A", "Approved", 100),
            done("B", "Not Passed", 10),
            open("B", "", 20),
            open("B", "", 700),
            open("B", "Docs missing", 20),
        ];
        let o = build_overview(&records, None, &EngineConfig::default(), now());
        let converted: u64 = o.time_intervals_by_converted.iter().map(|b| b.total).sum();
        let pending: u64 = o.time_intervals_by_pending.iter().map(|b| b.total).sum();
        assert_eq!(converted, o.conversion.converted);
        assert_eq!(pending, o.conversion.pending);
        assert_eq!(o.conversion.need_attention, 1);
    }

    #[test]
    fn product_metrics_sorted_by_performance() {
        let records = vec![
            with_product(done("A", "Approved", 10), "MC", "New"),
            with_product(done("A", "Approved", 10), "C4C", "C4C_Topup"),
            with_product(done("B", "Approved", 10), "C4C", "C4C_Topup"),
            with_product(open("B", "", 10), "Used", ""),
        ];
        let o = build_overview(&records, None, &EngineConfig::default(), now());
        let products = o.product_metrics.expect("application stream has products");
        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["C4C Topup | C4C", "MC"]);
        assert_eq!(products[0].conversion.converted, 2);
    }

    #[test]
    fn review_stream_is_nested_without_products() {
        let apps = vec![done("A", "Approved", 10)];
        let reviews = vec![
            done("R1", "Completed", 45),
            done("R2", "completed", 15),
            open("R2", "Assigned", 400),
            done("R3", "Returned", 15),
        ];
        let o = build_overview(&apps, Some(&reviews[..]), &EngineConfig::default(), now());
        let ca = o.ca_final.expect("review overview");
        assert!(ca.product_metrics.is_none());
        assert!(ca.ca_final.is_none());
        assert_eq!(ca.active_executor, 3);
        assert_eq!(ca.conversion.total, 4);
        assert_eq!(ca.conversion.converted, 2);
        assert_eq!(ca.conversion.need_attention, 1);
        assert_eq!(ca.best_time_performer.unwrap().display_name, "R2");
    }

    #[test]
    fn identical_inputs_give_identical_reports() {
        let records = vec![
            done("A", "Approved", 10),
            done("B", "Approved", 10),
            done("C", "Approved", 10),
            open("C", "", 400),
        ];
        let cfg = EngineConfig::default();
        let first = build_overview(&records, Some(&records[..]), &cfg, now());
        let second = build_overview(&records, Some(&records[..]), &cfg, now());
        assert_eq!(first, second);
    }

    #[test]
    fn pending_age_follows_reference_time() {
        let records = vec![open("A", "", 200)];
        let cfg = EngineConfig::default();
        let early = build_overview(&records, None, &cfg, now());
        let later = build_overview(&records, None, &cfg, now() + TimeDelta::hours(2));
        assert_eq!(early.conversion.need_attention, 0);
        assert_eq!(later.conversion.need_attention, 1);
        assert_ne!(early.time_intervals_by_pending, later.time_intervals_by_pending);
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let apps = vec![done("A", "Approved", 10)];
        let reviews: Vec<CaseRecord> = Vec::new();
        let o = build_overview(&apps, Some(&reviews[..]), &EngineConfig::default(), now());
        let json = serde_json::to_value(&o).unwrap();
        for key in [
            "activeExecutor",
            "bestTimeSlot",
            "topPerformer",
            "bestTimePerformer",
            "conversion",
            "timeIntervalsByConverted",
            "timeIntervalsByPending",
            "leaderboards",
            "productMetrics",
            "caFinal",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json["caFinal"].get("productMetrics").is_none());
        assert_eq!(json["conversion"]["averageTimeSecs"], 600);
        assert_eq!(json["bestTimeSlot"], "<30min");
    }
}
