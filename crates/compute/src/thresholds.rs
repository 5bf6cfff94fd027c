//! Declarative metric thresholds.
//!
//! A [`MetricThresholds`] value is a reusable predicate over named metrics.
//! It works on anything that can answer a metric by name ([`MetricSource`]):
//! full table metric bundles, explanation metrics and explanations.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::explanation::{Explanation, ExplanationMetrics};
use crate::metrics::{compute_metrics, ContingencyTable, MetricBundle};

/// Anything that can look up a metric value by name.
pub trait MetricSource {
    fn metric(&self, name: &str) -> Option<f64>;
}

impl MetricSource for MetricBundle {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

impl MetricSource for ExplanationMetrics {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

impl MetricSource for Explanation {
    fn metric(&self, name: &str) -> Option<f64> {
        self.metrics().get(name)
    }
}

impl MetricSource for HashMap<String, f64> {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<T: MetricSource + ?Sized> MetricSource for &T {
    fn metric(&self, name: &str) -> Option<f64> {
        (**self).metric(name)
    }
}

/// Minimum and maximum bounds on named metrics.
///
/// A metric named by a bound but missing from the source fails the bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    #[serde(default)]
    pub min_support: Option<f64>,
    #[serde(default)]
    pub min_outlier_support: Option<f64>,
    #[serde(default)]
    pub min_inlier_support: Option<f64>,
    #[serde(default)]
    pub min_risk_ratio: Option<f64>,
    #[serde(default)]
    pub min_risk_difference: Option<f64>,
    #[serde(default)]
    pub min_lift: Option<f64>,
    #[serde(default)]
    pub min_leverage: Option<f64>,
    /// Extra lower bounds keyed by metric name.
    #[serde(default)]
    pub minimums: BTreeMap<String, f64>,
    /// Upper bounds keyed by metric name.
    #[serde(default)]
    pub maximums: BTreeMap<String, f64>,
}

impl MetricThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minimum(mut self, metric: impl Into<String>, threshold: f64) -> Self {
        self.minimums.insert(metric.into(), threshold);
        self
    }

    pub fn with_maximum(mut self, metric: impl Into<String>, threshold: f64) -> Self {
        self.maximums.insert(metric.into(), threshold);
        self
    }

    fn minimums(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        let named = [
            ("support", self.min_support),
            ("outlier_support", self.min_outlier_support),
            ("inlier_support", self.min_inlier_support),
            ("risk_ratio", self.min_risk_ratio),
            ("risk_difference", self.min_risk_difference),
            ("lift", self.min_lift),
            ("leverage", self.min_leverage),
        ];
        named
            .into_iter()
            .filter_map(|(name, threshold)| threshold.map(|t| (name, t)))
            .chain(self.minimums.iter().map(|(name, t)| (name.as_str(), *t)))
    }

    fn maximums(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.maximums.iter().map(|(name, t)| (name.as_str(), *t))
    }

    /// An undefined (NaN) value fails every bound it is checked against.
    pub fn passes<M: MetricSource + ?Sized>(&self, metrics: &M) -> bool {
        self.minimums().all(|(name, t)| meets_minimum(metrics.metric(name), t))
            && self.maximums().all(|(name, t)| meets_maximum(metrics.metric(name), t))
    }

    /// Compute the table's metrics and check them.
    pub fn passes_table(&self, table: &ContingencyTable) -> bool {
        self.passes(&compute_metrics(table))
    }

    /// Metric name -> (observed value, threshold) for every failed bound.
    pub fn failed_thresholds<M: MetricSource + ?Sized>(&self, metrics: &M) -> BTreeMap<String, (Option<f64>, f64)> {
        let mut failures = BTreeMap::new();
        for (name, t) in self.minimums() {
            let value = metrics.metric(name);
            if !meets_minimum(value, t) {
                failures.insert(name.to_string(), (value, t));
            }
        }
        for (name, t) in self.maximums() {
            let value = metrics.metric(name);
            if !meets_maximum(value, t) {
                failures.insert(name.to_string(), (value, t));
            }
        }
        failures
    }

    /// Keep the items that pass. Filtering twice gives the same result.
    pub fn filter<M: MetricSource>(&self, items: impl IntoIterator<Item = M>) -> Vec<M> {
        items.into_iter().filter(|m| self.passes(m)).collect()
    }
}

fn meets_minimum(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v >= threshold)
}

fn meets_maximum(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v <= threshold)
}

/// Candidates whose table metrics pass `thresholds`, with those metrics.
///
/// Metrics are looked up in `cache` first and stored there when computed,
/// so repeated passes over the same candidates reuse them.
pub fn filter_candidates<K, I>(
    candidates: I,
    thresholds: &MetricThresholds,
    cache: &mut HashMap<K, MetricBundle>,
) -> Vec<(K, MetricBundle)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, ContingencyTable)>,
{
    let mut passing = Vec::new();
    for (candidate, table) in candidates {
        let metrics = *cache
            .entry(candidate.clone())
            .or_insert_with(|| compute_metrics(&table));
        if thresholds.passes(&metrics) {
            passing.push((candidate, metrics));
        }
    }
    passing
}
