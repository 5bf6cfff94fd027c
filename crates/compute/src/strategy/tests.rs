#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Instant;

    use sift_core::{AttributeValue, Dataset, FieldValue};

    use crate::combination::{Combination, Item};
    use crate::explanation::{Explanation, RatioMetric};
    use crate::fd::FunctionalDependencies;
    use crate::prepared::PreparedDataset;
    use crate::strategy::{join_level, ExhaustiveStrategy, HeuristicStrategy, SearchContext, SearchStrategy};

    const ROWS: [(&str, &str, &str, &str, i64); 14] = [
        ("US", "Chrome", "A", "94107", 1),
        ("US", "Chrome", "A", "94107", 1),
        ("US", "Chrome", "B", "94107", 1),
        ("US", "Firefox", "B", "94107", 1),
        ("US", "Chrome", "A", "94107", 0),
        ("US", "Chrome", "B", "94107", 0),
        ("US", "Safari", "A", "94107", 0),
        ("US", "Firefox", "B", "94107", 0),
        ("EU", "Chrome", "A", "75001", 0),
        ("EU", "Chrome", "B", "75001", 0),
        ("EU", "Firefox", "B", "75001", 0),
        ("ASIA", "Chrome", "A", "100-0001", 0),
        ("ASIA", "Chrome", "B", "100-0001", 0),
        ("ASIA", "Safari", "B", "100-0001", 0),
    ];

    fn prepared() -> PreparedDataset {
        let dataset = Dataset::from_records(ROWS.iter().map(|(region, browser, segment, zip, flag)| {
            vec![
                ("region", FieldValue::from(*region)),
                ("browser", FieldValue::from(*browser)),
                ("segment", FieldValue::from(*segment)),
                ("zip", FieldValue::from(*zip)),
                ("is_outlier", FieldValue::Integer(*flag)),
            ]
        }));
        PreparedDataset::build(&dataset, "is_outlier", None).unwrap()
    }

    fn ctx<'a>() -> SearchContext<'a> {
        SearchContext::new(0.1, 1.0, RatioMetric::RiskRatio, 4)
    }

    fn frequent_singletons(prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> Vec<Combination> {
        let vocab = prepared.vocabulary();
        let mut level: Vec<Combination> = vocab
            .attribute_ids()
            .flat_map(|a| vocab.value_ids(a).map(move |v| Combination::singleton(Item::new(a, v))))
            .filter(|c| ctx.has_min_support(&prepared.score(c)))
            .collect();
        level.sort();
        level
    }

    fn keys(explanations: &[Explanation]) -> HashSet<Vec<(String, String)>> {
        explanations
            .iter()
            .map(|e| e.attributes.iter().map(|(k, v)| (k.clone(), v.to_string())).collect())
            .collect()
    }

    fn find<'e>(explanations: &'e [Explanation], pairs: &[(&str, &str)]) -> Option<&'e Explanation> {
        explanations.iter().find(|e| {
            e.attributes.len() == pairs.len()
                && pairs
                    .iter()
                    .all(|(k, v)| e.attributes.get(*k) == Some(&AttributeValue::from(*v)))
        })
    }

    #[test]
    fn join_keeps_only_candidates_with_frequent_subsets() {
        let prepared = prepared();
        let ctx = ctx();
        let level1 = frequent_singletons(&prepared, &ctx);
        // US, Chrome, Firefox, A, B, 94107
        assert_eq!(level1.len(), 6);

        let level2 = join_level(&level1, &ctx);
        assert!(!level2.is_empty());
        let previous: HashSet<&Combination> = level1.iter().collect();
        for candidate in &level2 {
            assert_eq!(candidate.len(), 2);
            assert!(candidate.subsets().all(|s| previous.contains(&s)));
        }
    }

    #[test]
    fn join_output_is_sorted_and_conflict_free() {
        let prepared = prepared();
        let ctx = ctx();
        let level2 = join_level(&frequent_singletons(&prepared, &ctx), &ctx);

        let mut sorted = level2.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(level2, sorted);
        for candidate in &level2 {
            let attrs: Vec<_> = candidate.attributes().collect();
            assert_ne!(attrs[0], attrs[1]);
        }
        // Chrome and Firefox never join: same attribute.
        assert_eq!(level2.len(), 13);
    }

    #[test]
    fn exhaustive_finds_the_planted_pattern() {
        let prepared = prepared();
        let (explanations, stats) = ExhaustiveStrategy::new().run(&prepared, &ctx());

        let top = find(&explanations, &[("region", "US"), ("browser", "Chrome"), ("segment", "A")]).unwrap();
        assert!((top.support_outliers - 0.5).abs() < 1e-12);
        assert!((top.support_inliers - 0.1).abs() < 1e-12);
        assert!((top.risk_ratio - 5.0).abs() < 1e-9);
        assert!(explanations.iter().all(|e| e.support_outliers >= 0.1));
        assert!(explanations.iter().all(|e| e.risk_ratio >= 1.0));
        assert_eq!(keys(&explanations).len(), explanations.len());
        assert!(!stats.deadline_hit);
    }

    #[test]
    fn fd_hints_prune_determinant_dependent_pairs() {
        let prepared = prepared();
        let fds: FunctionalDependencies = [("region", vec!["zip"])].into_iter().collect();
        let index = fds.index(prepared.vocabulary());
        let ctx = ctx().with_fd_index(Some(&index));

        for strategy in [
            Box::new(ExhaustiveStrategy::new()) as Box<dyn SearchStrategy>,
            Box::new(HeuristicStrategy::new(5)) as Box<dyn SearchStrategy>,
        ] {
            let explanations = strategy.generate_candidates(&prepared, &ctx);
            assert!(
                explanations
                    .iter()
                    .all(|e| !(e.attributes.contains_key("region") && e.attributes.contains_key("zip"))),
                "{} kept a region/zip combination",
                strategy.name()
            );
            assert!(find(&explanations, &[("region", "US"), ("browser", "Chrome")]).is_some());
        }
    }

    #[test]
    fn heuristic_results_are_a_subset_of_exhaustive() {
        let prepared = prepared();
        let ctx = ctx();
        let exhaustive = keys(&ExhaustiveStrategy::new().generate_candidates(&prepared, &ctx));
        for width in [1, 2, 5, 50] {
            let heuristic = HeuristicStrategy::new(width).generate_candidates(&prepared, &ctx);
            assert!(keys(&heuristic).is_subset(&exhaustive), "beam width {}", width);
        }
    }

    #[test]
    fn narrow_beam_evaluates_fewer_candidates() {
        let prepared = prepared();
        let ctx = ctx();
        let (_, narrow) = HeuristicStrategy::new(1).run(&prepared, &ctx);
        let (_, wide) = HeuristicStrategy::new(50).run(&prepared, &ctx);
        assert!(narrow.evaluated < wide.evaluated);
        // Level 1 is the same for both.
        assert!(narrow.evaluated > 11);
    }

    #[test]
    fn heuristic_with_wide_beam_keeps_the_planted_pattern() {
        let prepared = prepared();
        let explanations = HeuristicStrategy::new(5).generate_candidates(&prepared, &ctx());
        let top = find(&explanations, &[("region", "US"), ("browser", "Chrome"), ("segment", "A")]).unwrap();
        assert!((top.risk_ratio - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_beam_width_is_clamped() {
        assert_eq!(HeuristicStrategy::new(0).beam_width(), 1);
    }

    #[test]
    fn max_order_one_stops_after_singletons() {
        let prepared = prepared();
        let ctx = SearchContext::new(0.1, 1.0, RatioMetric::RiskRatio, 1);
        let (explanations, stats) = ExhaustiveStrategy::new().run(&prepared, &ctx);
        assert!(explanations.iter().all(|e| e.order() == 1));
        assert_eq!(stats.levels, 1);

        let (explanations, _) = HeuristicStrategy::new(3).run(&prepared, &ctx);
        assert!(explanations.iter().all(|e| e.order() == 1));
    }

    #[test]
    fn expired_deadline_stops_after_first_level() {
        let prepared = prepared();
        let ctx = ctx().with_deadline(Some(Instant::now()));

        let (explanations, stats) = ExhaustiveStrategy::new().run(&prepared, &ctx);
        assert!(stats.deadline_hit);
        assert_eq!(stats.levels, 1);
        assert!(explanations.iter().all(|e| e.order() == 1));

        let (_, stats) = HeuristicStrategy::new(5).run(&prepared, &ctx);
        assert!(stats.deadline_hit);
        assert_eq!(stats.levels, 1);
    }

    #[test]
    fn pooled_evaluation_matches_sequential() {
        let prepared = prepared();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let sequential = ctx();
        let parallel = ctx().with_pool(Some(&pool));

        assert_eq!(
            ExhaustiveStrategy::new().generate_candidates(&prepared, &sequential),
            ExhaustiveStrategy::new().generate_candidates(&prepared, &parallel)
        );
        assert_eq!(
            HeuristicStrategy::new(4).generate_candidates(&prepared, &sequential),
            HeuristicStrategy::new(4).generate_candidates(&prepared, &parallel)
        );
    }
}
