//! Candidate search strategies.
//!
//! Both strategies walk the combination lattice level by level and share
//! the same threshold and scoring rules through [`SearchContext`]:
//! - [`ExhaustiveStrategy`]: level-wise self-join with subset-frequency pruning
//! - [`HeuristicStrategy`]: beam search ranked by the ratio metric

mod exhaustive;
mod heuristic;
mod tests;

pub use exhaustive::{join_level, ExhaustiveStrategy};
pub use heuristic::HeuristicStrategy;

use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;

use crate::combination::{is_valid, Combination};
use crate::explanation::{Explanation, ExplanationMetrics, RatioMetric};
use crate::fd::FdIndex;
use crate::prepared::PreparedDataset;

/// A search procedure turning a prepared dataset into explanations.
///
/// Implementations assume `prepared` is already validated and never fail.
/// Ranking and truncation happen outside, in [`crate::ranking`].
pub trait SearchStrategy: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Every qualifying explanation found, in no particular order, without
    /// duplicates.
    fn generate_candidates(&self, prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> Vec<Explanation>;
}

/// Thresholds and bounds shared by every level of one search.
pub struct SearchContext<'a> {
    pub min_support: f64,
    pub min_ratio_metric: f64,
    pub ratio_metric: RatioMetric,
    pub max_order: usize,
    /// Present only when FD-hint pruning is enabled.
    pub fd_index: Option<&'a FdIndex>,
    pool: Option<&'a rayon::ThreadPool>,
    deadline: Option<Instant>,
}

/// Counters reported at the end of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub levels: usize,
    pub evaluated: usize,
    pub frequent: usize,
    pub emitted: usize,
    pub deadline_hit: bool,
}

impl<'a> SearchContext<'a> {
    pub fn new(min_support: f64, min_ratio_metric: f64, ratio_metric: RatioMetric, max_order: usize) -> Self {
        Self {
            min_support,
            min_ratio_metric,
            ratio_metric,
            max_order,
            fd_index: None,
            pool: None,
            deadline: None,
        }
    }

    pub fn with_fd_index(mut self, fd_index: Option<&'a FdIndex>) -> Self {
        self.fd_index = fd_index;
        self
    }

    /// Evaluate candidates of a level on this pool instead of the caller's thread.
    pub fn with_pool(mut self, pool: Option<&'a rayon::ThreadPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn is_valid(&self, combination: &Combination) -> bool {
        is_valid(combination, self.max_order, self.fd_index)
    }

    pub fn has_min_support(&self, metrics: &ExplanationMetrics) -> bool {
        metrics.support_outliers >= self.min_support
    }

    pub fn satisfies_ratio(&self, metrics: &ExplanationMetrics) -> bool {
        let value = self.ratio_metric.of(metrics);
        !value.is_nan() && value >= self.min_ratio_metric
    }

    /// Ranking score of a candidate; undefined values rank as 0.
    pub fn score(&self, metrics: &ExplanationMetrics) -> f64 {
        let value = self.ratio_metric.of(metrics);
        if value.is_nan() {
            0.0
        } else {
            value
        }
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Score every candidate of one level.
    ///
    /// Results keep the input order whether or not a pool is used; the
    /// returned vector is the barrier before the next level is generated.
    pub fn evaluate(
        &self,
        prepared: &PreparedDataset,
        candidates: Vec<Combination>,
    ) -> Vec<(Combination, ExplanationMetrics)> {
        match self.pool {
            Some(pool) if candidates.len() > 1 => pool.install(|| {
                candidates
                    .into_par_iter()
                    .map(|c| {
                        let metrics = prepared.score(&c);
                        (c, metrics)
                    })
                    .collect()
            }),
            _ => candidates
                .into_iter()
                .map(|c| {
                    let metrics = prepared.score(&c);
                    (c, metrics)
                })
                .collect(),
        }
    }

    /// Explanation for a candidate that passed both thresholds.
    pub fn build_explanation(
        &self,
        prepared: &PreparedDataset,
        combination: &Combination,
        metrics: ExplanationMetrics,
    ) -> Explanation {
        Explanation::new(prepared.vocabulary().resolve(combination), metrics)
    }
}

/// Order candidates best-first: score descending, then combination ascending.
pub(crate) fn by_score_desc(a: &(f64, Combination), b: &(f64, Combination)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}
