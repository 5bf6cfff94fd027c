use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use super::{SearchContext, SearchStats, SearchStrategy};
use crate::combination::{Combination, Item};
use crate::explanation::Explanation;
use crate::prepared::PreparedDataset;

/// Level-wise frequent-pattern search.
///
/// Level 1 scores every observed `attribute = value`. Level k+1 candidates
/// come from joining level-k frequent combinations that share their first
/// k-1 items, and survive only if all of their k-item subsets were frequent.
/// Outlier support can only shrink as items are added, so a candidate with
/// an infrequent subset can never be frequent itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveStrategy;

impl ExhaustiveStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Run the search and return explanations plus counters.
    pub fn run(&self, prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> (Vec<Explanation>, SearchStats) {
        let mut explanations = Vec::new();
        let mut stats = SearchStats::default();

        let vocab = prepared.vocabulary();
        let singletons: Vec<Combination> = vocab
            .attribute_ids()
            .flat_map(|attr| vocab.value_ids(attr).map(move |v| Combination::singleton(Item::new(attr, v))))
            .filter(|c| ctx.is_valid(c))
            .collect();

        let mut frequent = self.evaluate_level(prepared, ctx, singletons, &mut explanations, &mut stats);

        let mut k = 2;
        while !frequent.is_empty() && k <= ctx.max_order {
            if ctx.deadline_exceeded() {
                warn!(level = k, "Deadline reached; stopping exhaustive search early");
                stats.deadline_hit = true;
                break;
            }
            let candidates = join_level(&frequent, ctx);
            debug!(level = k, candidates = candidates.len(), "Generated candidates");
            frequent = self.evaluate_level(prepared, ctx, candidates, &mut explanations, &mut stats);
            k += 1;
        }

        (explanations, stats)
    }

    /// Score one level, emit qualifying explanations, return the frequent set
    /// in sorted order.
    fn evaluate_level(
        &self,
        prepared: &PreparedDataset,
        ctx: &SearchContext<'_>,
        candidates: Vec<Combination>,
        explanations: &mut Vec<Explanation>,
        stats: &mut SearchStats,
    ) -> Vec<Combination> {
        stats.levels += 1;
        stats.evaluated += candidates.len();

        let mut frequent = Vec::new();
        for (combination, metrics) in ctx.evaluate(prepared, candidates) {
            if !ctx.has_min_support(&metrics) {
                continue;
            }
            if ctx.satisfies_ratio(&metrics) {
                explanations.push(ctx.build_explanation(prepared, &combination, metrics));
                stats.emitted += 1;
            }
            frequent.push(combination);
        }
        stats.frequent += frequent.len();
        frequent.sort();
        frequent
    }
}

impl SearchStrategy for ExhaustiveStrategy {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn generate_candidates(&self, prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> Vec<Explanation> {
        let (explanations, stats) = self.run(prepared, ctx);
        debug!(
            levels = stats.levels,
            evaluated = stats.evaluated,
            frequent = stats.frequent,
            emitted = stats.emitted,
            "Exhaustive search complete"
        );
        explanations
    }
}

/// Self-join a sorted frequent level into the next level's candidates.
///
/// Two combinations join only when they agree on all but their last item;
/// the result is kept only if it is valid and every one-item-smaller subset
/// is in `previous`. Output is sorted and duplicate-free.
pub fn join_level(previous: &[Combination], ctx: &SearchContext<'_>) -> Vec<Combination> {
    let previous_set: HashSet<&Combination> = previous.iter().collect();
    let mut candidates = BTreeSet::new();

    for (i, left) in previous.iter().enumerate() {
        for right in &previous[i + 1..] {
            // Sorted input keeps every shared prefix contiguous.
            if !left.shares_prefix(right) {
                break;
            }
            let Some(last) = right.last() else {
                continue;
            };
            let Some(merged) = left.extended(last) else {
                continue;
            };
            if merged.len() != left.len() + 1 || !ctx.is_valid(&merged) {
                continue;
            }
            if !merged.subsets().all(|s| previous_set.contains(&s)) {
                continue;
            }
            candidates.insert(merged);
        }
    }

    candidates.into_iter().collect()
}
