use std::cmp::Ordering;

use crate::explanation::{Explanation, RatioMetric};

/// Order explanations best-first and keep the top `top_k`.
///
/// Sort keys, in order: the ratio metric (descending, `+inf` highest),
/// outlier support (descending), risk difference (descending), then the
/// attribute map itself so equal-scoring explanations always come out in
/// the same order. Explanations whose metric is undefined are dropped.
/// `top_k = None` keeps everything; `Some(0)` keeps nothing.
pub fn rank_explanations(
    explanations: Vec<Explanation>,
    metric: RatioMetric,
    top_k: Option<usize>,
) -> Vec<Explanation> {
    let mut keyed: Vec<(f64, Explanation)> = explanations
        .into_iter()
        .filter_map(|e| metric.value(&e).map(|v| (v, e)))
        .collect();

    keyed.sort_by(|(va, a), (vb, b)| compare(*va, a, *vb, b));

    let mut ranked: Vec<Explanation> = keyed.into_iter().map(|(_, e)| e).collect();
    if let Some(k) = top_k {
        ranked.truncate(k);
    }
    ranked
}

fn compare(va: f64, a: &Explanation, vb: f64, b: &Explanation) -> Ordering {
    vb.total_cmp(&va)
        .then_with(|| b.support_outliers.total_cmp(&a.support_outliers))
        .then_with(|| b.risk_difference.total_cmp(&a.risk_difference))
        .then_with(|| a.attributes.cmp(&b.attributes))
}
