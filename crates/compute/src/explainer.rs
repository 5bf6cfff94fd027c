use std::time::Instant;

use sift_core::{Dataset, ExplainConfig, SiftError, StrategyKind};
use tracing::{debug, info};

use crate::explanation::{Explanation, RatioMetric};
use crate::fd::FunctionalDependencies;
use crate::prepared::PreparedDataset;
use crate::ranking::rank_explanations;
use crate::strategy::{ExhaustiveStrategy, HeuristicStrategy, SearchContext, SearchStrategy};

/// Entry point of the engine: finds the attribute-value combinations that
/// best separate outlier rows from inlier rows.
///
/// An `Explainer` holds configuration only. Every call prepares its own
/// dataset view and search state, so one instance can serve concurrent
/// callers.
#[derive(Debug, Clone, Default)]
pub struct Explainer {
    config: ExplainConfig,
}

impl Explainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ExplainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.config.min_support = min_support;
        self
    }

    pub fn with_min_ratio_metric(mut self, min_ratio_metric: f64) -> Self {
        self.config.min_ratio_metric = min_ratio_metric;
        self
    }

    /// The name is checked when `explain` runs.
    pub fn with_ratio_metric(mut self, ratio_metric: impl Into<String>) -> Self {
        self.config.ratio_metric = ratio_metric.into();
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_outlier_column(mut self, column: impl Into<String>) -> Self {
        self.config.outlier_column = column.into();
        self
    }

    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.config.max_order = Some(max_order);
        self
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.config.top_k = top_k;
        self
    }

    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.config.beam_width = beam_width;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Declare `determinant -> dependents` hints. They only take effect
    /// after [`Explainer::enable_fd_hints`].
    pub fn with_functional_dependencies<I, S, D>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<D>)>,
        S: Into<String>,
        D: Into<String>,
    {
        for (determinant, dependents) in hints {
            self.config
                .functional_dependencies
                .entry(determinant.into())
                .or_default()
                .extend(dependents.into_iter().map(Into::into));
        }
        self
    }

    pub fn enable_fd_hints(mut self, enabled: bool) -> Self {
        self.config.use_fd_hints = enabled;
        self
    }

    /// 1 = evaluate on the calling thread, 0 = one worker per core.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.config.worker_threads = worker_threads;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: Option<u64>) -> Self {
        self.config.deadline_ms = deadline_ms;
        self
    }

    /// Explain the configured outlier column of `dataset`.
    pub fn explain(&self, dataset: &Dataset) -> Result<Vec<Explanation>, SiftError> {
        self.run(dataset, &self.config.outlier_column)
    }

    /// Explain an outlier column other than the configured one.
    pub fn explain_column(&self, dataset: &Dataset, outlier_column: &str) -> Result<Vec<Explanation>, SiftError> {
        self.run(dataset, outlier_column)
    }

    fn run(&self, dataset: &Dataset, outlier_column: &str) -> Result<Vec<Explanation>, SiftError> {
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;
        let metric: RatioMetric = config.ratio_metric.parse()?;
        config.log_summary();

        let prepared = PreparedDataset::build(dataset, outlier_column, config.attributes.as_deref())?;
        let max_order = config
            .max_order
            .unwrap_or_else(|| prepared.vocabulary().attribute_count())
            .max(1);

        let fd_index = if config.use_fd_hints && !config.functional_dependencies.is_empty() {
            let hints: FunctionalDependencies = config
                .functional_dependencies
                .iter()
                .map(|(determinant, dependents)| (determinant.clone(), dependents.clone()))
                .collect();
            Some(hints.index(prepared.vocabulary())).filter(|index| !index.is_empty())
        } else {
            None
        };

        let threads = config.resolved_worker_threads();
        let pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("sift-eval-{}", i))
                .build()
                .map_err(|e| SiftError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        let strategy: Box<dyn SearchStrategy> = match config.strategy {
            StrategyKind::Exhaustive => Box::new(ExhaustiveStrategy::new()),
            StrategyKind::Heuristic => Box::new(HeuristicStrategy::new(config.beam_width)),
        };

        info!(
            rows = prepared.total_rows(),
            outliers = prepared.n_outliers(),
            inliers = prepared.n_inliers(),
            attributes = prepared.vocabulary().attribute_count(),
            strategy = strategy.name(),
            threads,
            "Explaining outliers in '{}'",
            outlier_column
        );

        let deadline = config.deadline().map(|d| start + d);
        let ctx = SearchContext::new(config.min_support, config.min_ratio_metric, metric, max_order)
            .with_fd_index(fd_index.as_ref())
            .with_pool(pool.as_ref())
            .with_deadline(deadline);

        let search_start = Instant::now();
        let candidates = strategy.generate_candidates(&prepared, &ctx);
        debug!(
            candidates = candidates.len(),
            "Search done in {:.3}s",
            search_start.elapsed().as_secs_f64()
        );

        let ranked = rank_explanations(candidates, metric, config.top_k);
        info!(
            explanations = ranked.len(),
            "Explain complete in {:.3}s",
            start.elapsed().as_secs_f64()
        );
        Ok(ranked)
    }
}
