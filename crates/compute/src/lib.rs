pub mod combination;
pub mod explainer;
pub mod explanation;
pub mod fd;
pub mod metrics;
pub mod prepared;
pub mod ranking;
pub mod strategy;
pub mod thresholds;

pub use combination::{Combination, Item, Vocabulary};
pub use explainer::Explainer;
pub use explanation::{reports_json, Explanation, ExplanationMetrics, ExplanationReport, RatioMetric};
pub use fd::{
    check_functional_dependency, dependency_summary, FdIndex, FunctionalDependencies,
    FunctionalDependencyResult,
};
pub use metrics::{
    compute_metrics, update_metric_summary, BinaryGroup, ContingencyTable, MetricBundle, TableCounts,
};
pub use prepared::PreparedDataset;
pub use ranking::rank_explanations;
pub use strategy::{ExhaustiveStrategy, HeuristicStrategy, SearchContext, SearchStats, SearchStrategy};
pub use thresholds::{filter_candidates, MetricSource, MetricThresholds};
