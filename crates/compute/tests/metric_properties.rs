use std::collections::HashSet;

use proptest::prelude::*;
use sift_compute::metrics::{inlier_support, outlier_support, risk_ratio, support};
use sift_compute::strategy::join_level;
use sift_compute::*;
use sift_core::{Dataset, FieldValue};

fn table(eo: usize, ei: usize, uo: usize, ui: usize) -> ContingencyTable {
    ContingencyTable::from_groups(BinaryGroup::from_counts(eo, ei), BinaryGroup::from_counts(uo, ui))
}

/// Rows of three small-cardinality attributes; the first row is always an
/// outlier and the second always an inlier.
fn dataset(rows: &[(i64, i64, i64, bool)]) -> Dataset {
    Dataset::from_records(rows.iter().enumerate().map(|(i, (a, b, c, flag))| {
        let flag = match i {
            0 => true,
            1 => false,
            _ => *flag,
        };
        vec![
            ("a", FieldValue::Integer(*a)),
            ("b", FieldValue::Integer(*b)),
            ("c", FieldValue::Integer(*c)),
            ("flag", FieldValue::Boolean(flag)),
        ]
    }))
}

fn row_strategy() -> impl Strategy<Value = Vec<(i64, i64, i64, bool)>> {
    prop::collection::vec((0i64..3, 0i64..3, 0i64..2, any::<bool>()), 2..40)
}

proptest! {
    #[test]
    fn risk_ratio_is_zero_when_a_group_is_empty(eo in 0usize..20, ei in 0usize..20, uo in 0usize..20, ui in 0usize..20) {
        let rr = risk_ratio(&table(eo, ei, uo, ui));
        if eo + ei == 0 || uo + ui == 0 {
            prop_assert_eq!(rr, 0.0);
        } else if uo == 0 {
            prop_assert_eq!(rr, f64::INFINITY);
        } else {
            prop_assert!(rr.is_finite() && rr >= 0.0);
        }
    }

    #[test]
    fn supports_stay_in_unit_interval(eo in 0usize..20, ei in 0usize..20, uo in 0usize..20, ui in 0usize..20) {
        let t = table(eo, ei, uo, ui);
        for value in [support(&t), outlier_support(&t), inlier_support(&t)] {
            prop_assert!((0.0..=1.0).contains(&value), "support {} out of range", value);
        }
        let m = ExplanationMetrics::from_table(&t);
        prop_assert!(!m.significance.is_nan());
        prop_assert!((m.risk_difference - (m.support_outliers - m.support_inliers)).abs() < 1e-12);
    }

    #[test]
    fn threshold_filtering_is_idempotent(
        counts in prop::collection::vec((0usize..10, 0usize..10, 0usize..10, 0usize..10), 0..30),
        min_risk_ratio in 0.0f64..4.0,
        max_support in 0.0f64..1.0,
    ) {
        let thresholds = MetricThresholds {
            min_risk_ratio: Some(min_risk_ratio),
            ..Default::default()
        }
        .with_maximum("support", max_support);
        let bundles: Vec<MetricBundle> = counts
            .iter()
            .map(|&(eo, ei, uo, ui)| compute_metrics(&table(eo, ei, uo, ui)))
            .collect();

        let once = thresholds.filter(bundles);
        let twice = thresholds.filter(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn joined_candidates_have_only_frequent_subsets(rows in row_strategy(), min_support in 0.05f64..0.8) {
        let prepared = PreparedDataset::build(&dataset(&rows), "flag", None).unwrap();
        let ctx = SearchContext::new(min_support, 0.0, RatioMetric::SupportOutliers, 3);

        let vocab = prepared.vocabulary();
        let mut level: Vec<Combination> = vocab
            .attribute_ids()
            .flat_map(|a| vocab.value_ids(a).map(move |v| Combination::singleton(Item::new(a, v))))
            .filter(|c| ctx.has_min_support(&prepared.score(c)))
            .collect();
        level.sort();

        while !level.is_empty() {
            let previous: HashSet<&Combination> = level.iter().collect();
            let next = join_level(&level, &ctx);
            for candidate in &next {
                prop_assert_eq!(candidate.len(), level[0].len() + 1);
                prop_assert!(candidate.subsets().all(|s| previous.contains(&s)));
            }
            let mut frequent: Vec<Combination> = next
                .into_iter()
                .filter(|c| ctx.has_min_support(&prepared.score(c)))
                .collect();
            frequent.sort();
            level = frequent;
        }
    }

    #[test]
    fn results_respect_support_and_beam_is_subset(rows in row_strategy(), min_support in 0.05f64..0.8, beam in 1usize..6) {
        let data = dataset(&rows);
        let base = Explainer::new()
            .with_outlier_column("flag")
            .with_min_support(min_support)
            .with_min_ratio_metric(1.0)
            .with_top_k(None);

        let exhaustive = base.clone().explain(&data).unwrap();
        for explanation in &exhaustive {
            prop_assert!(explanation.support_outliers >= min_support);
        }

        let heuristic = base
            .with_strategy(sift_core::StrategyKind::Heuristic)
            .with_beam_width(beam)
            .explain(&data)
            .unwrap();
        let complete: HashSet<String> = exhaustive.iter().map(|e| format!("{:?}", e.attributes)).collect();
        for explanation in &heuristic {
            let key = format!("{:?}", explanation.attributes);
            prop_assert!(complete.contains(&key), "beam result {} missing from exhaustive", key);
        }
    }
}
