use std::collections::HashSet;

use tracing::{debug, warn};

use super::{by_score_desc, SearchContext, SearchStats, SearchStrategy};
use crate::combination::{Combination, Item};
use crate::explanation::Explanation;
use crate::prepared::PreparedDataset;

/// Beam search over the combination lattice.
///
/// Trades completeness for tractable runtime on wide attribute sets: only
/// the `beam_width` best combinations of each depth are extended by one more
/// item. Combinations outside the beam are never revisited, so the global
/// optimum is only guaranteed when the beam is wide enough to keep it.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicStrategy {
    beam_width: usize,
}

impl HeuristicStrategy {
    /// A zero width is clamped to 1; configuration validation rejects it first.
    pub fn new(beam_width: usize) -> Self {
        Self {
            beam_width: beam_width.max(1),
        }
    }

    pub fn beam_width(&self) -> usize {
        self.beam_width
    }

    pub fn run(&self, prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> (Vec<Explanation>, SearchStats) {
        let mut explanations = Vec::new();
        let mut stats = SearchStats::default();
        // Owned by this call only; keyed on normalized combinations.
        let mut visited: HashSet<Combination> = HashSet::new();

        let vocab = prepared.vocabulary();
        let singletons: Vec<Combination> = vocab
            .attribute_ids()
            .flat_map(|attr| vocab.value_ids(attr).map(move |v| Combination::singleton(Item::new(attr, v))))
            .filter(|c| ctx.is_valid(c))
            .collect();
        visited.extend(singletons.iter().cloned());

        let mut beam = self.expand_level(prepared, ctx, singletons, &mut explanations, &mut stats);

        let mut depth = 1;
        while !beam.is_empty() && depth < ctx.max_order {
            if ctx.deadline_exceeded() {
                warn!(depth, "Deadline reached; stopping beam search early");
                stats.deadline_hit = true;
                break;
            }

            let mut expansions = Vec::new();
            for (_, base) in &beam {
                for attr in vocab.attribute_ids() {
                    if base.contains_attribute(attr) {
                        continue;
                    }
                    for value in vocab.value_ids(attr) {
                        let Some(candidate) = base.extended(Item::new(attr, value)) else {
                            continue;
                        };
                        if visited.contains(&candidate) || !ctx.is_valid(&candidate) {
                            continue;
                        }
                        visited.insert(candidate.clone());
                        expansions.push(candidate);
                    }
                }
            }
            debug!(depth = depth + 1, expansions = expansions.len(), "Expanded beam");

            beam = self.expand_level(prepared, ctx, expansions, &mut explanations, &mut stats);
            depth += 1;
        }

        (explanations, stats)
    }

    /// Score candidates, emit qualifying explanations immediately, and return
    /// the best `beam_width` frequent candidates as the next beam.
    fn expand_level(
        &self,
        prepared: &PreparedDataset,
        ctx: &SearchContext<'_>,
        candidates: Vec<Combination>,
        explanations: &mut Vec<Explanation>,
        stats: &mut SearchStats,
    ) -> Vec<(f64, Combination)> {
        stats.levels += 1;
        stats.evaluated += candidates.len();

        let mut scored = Vec::new();
        for (combination, metrics) in ctx.evaluate(prepared, candidates) {
            if !ctx.has_min_support(&metrics) {
                continue;
            }
            if ctx.satisfies_ratio(&metrics) {
                explanations.push(ctx.build_explanation(prepared, &combination, metrics));
                stats.emitted += 1;
            }
            scored.push((ctx.score(&metrics), combination));
        }
        stats.frequent += scored.len();

        scored.sort_by(by_score_desc);
        scored.truncate(self.beam_width);
        scored
    }
}

impl SearchStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn generate_candidates(&self, prepared: &PreparedDataset, ctx: &SearchContext<'_>) -> Vec<Explanation> {
        let (explanations, stats) = self.run(prepared, ctx);
        debug!(
            beam_width = self.beam_width,
            depth = stats.levels,
            evaluated = stats.evaluated,
            emitted = stats.emitted,
            "Beam search complete"
        );
        explanations
    }
}
