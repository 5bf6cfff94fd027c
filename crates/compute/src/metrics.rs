//! Summarization metrics over 2x2 contingency tables.
//!
//! A table compares rows matching a pattern ("exposed") with the rows that
//! do not ("unexposed"), split by outlier/inlier. Every metric has a fixed
//! value for zero denominators so that pruning decisions built on top of
//! them are deterministic:
//!
//! - ratios with an empty denominator are `0`
//! - [`risk_ratio`] is `+inf` when the unexposed group has no outliers but
//!   both groups are populated

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sift_core::SiftError;

/// Slack allowed when checking aggregated float counts against totals.
const TOTAL_TOLERANCE: f64 = 1e-12;

/// Outlier/inlier counts of one group. Counts may be raw integers or
/// aggregate weights; they only need to be non-negative and finite.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BinaryGroup {
    outliers: f64,
    inliers: f64,
}

impl BinaryGroup {
    pub fn new(outliers: f64, inliers: f64) -> Result<Self, SiftError> {
        if !outliers.is_finite() || !inliers.is_finite() {
            return Err(SiftError::InvalidCounts(format!(
                "counts must be finite (outliers={}, inliers={})",
                outliers, inliers
            )));
        }
        if outliers < 0.0 || inliers < 0.0 {
            return Err(SiftError::InvalidCounts(format!(
                "counts must be non-negative (outliers={}, inliers={})",
                outliers, inliers
            )));
        }
        Ok(Self { outliers, inliers })
    }

    /// Integer counts are always valid.
    pub fn from_counts(outliers: usize, inliers: usize) -> Self {
        Self {
            outliers: outliers as f64,
            inliers: inliers as f64,
        }
    }

    pub fn outliers(&self) -> f64 {
        self.outliers
    }

    pub fn inliers(&self) -> f64 {
        self.inliers
    }

    pub fn total(&self) -> f64 {
        self.outliers + self.inliers
    }
}

/// Immutable 2x2 contingency table.
///
/// `total` describes the global population; when omitted it is inferred as
/// `exposed + unexposed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable {
    exposed: BinaryGroup,
    unexposed: BinaryGroup,
    total: Option<BinaryGroup>,
}

/// Raw counts of a table, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableCounts {
    pub exposed_outliers: f64,
    pub exposed_inliers: f64,
    pub unexposed_outliers: f64,
    pub unexposed_inliers: f64,
    pub total_outliers: f64,
    pub total_inliers: f64,
    pub population: f64,
}

impl ContingencyTable {
    /// Build a table, checking group counts against an explicit total.
    ///
    /// An empty total (zero population) disables the check.
    pub fn new(
        exposed: BinaryGroup,
        unexposed: BinaryGroup,
        total: Option<BinaryGroup>,
    ) -> Result<Self, SiftError> {
        if let Some(total) = total.filter(|t| t.total() != 0.0) {
            let checks = [
                (exposed.outliers, total.outliers, "exposed outliers cannot exceed total outliers"),
                (exposed.inliers, total.inliers, "exposed inliers cannot exceed total inliers"),
                (unexposed.outliers, total.outliers, "unexposed outliers cannot exceed total outliers"),
                (unexposed.inliers, total.inliers, "unexposed inliers cannot exceed total inliers"),
                (
                    exposed.outliers + unexposed.outliers,
                    total.outliers + TOTAL_TOLERANCE,
                    "exposed+unexposed outliers exceed total outliers",
                ),
                (
                    exposed.inliers + unexposed.inliers,
                    total.inliers + TOTAL_TOLERANCE,
                    "exposed+unexposed inliers exceed total inliers",
                ),
            ];
            for (value, bound, message) in checks {
                if value > bound {
                    return Err(SiftError::InvalidTable(message.to_string()));
                }
            }
        }
        Ok(Self {
            exposed,
            unexposed,
            total,
        })
    }

    /// Table whose totals are inferred from the two groups.
    pub fn from_groups(exposed: BinaryGroup, unexposed: BinaryGroup) -> Self {
        Self {
            exposed,
            unexposed,
            total: None,
        }
    }

    pub fn exposed(&self) -> BinaryGroup {
        self.exposed
    }

    pub fn unexposed(&self) -> BinaryGroup {
        self.unexposed
    }

    pub fn total_outliers(&self) -> f64 {
        match self.total {
            Some(total) => total.outliers,
            None => self.exposed.outliers + self.unexposed.outliers,
        }
    }

    pub fn total_inliers(&self) -> f64 {
        match self.total {
            Some(total) => total.inliers,
            None => self.exposed.inliers + self.unexposed.inliers,
        }
    }

    pub fn population(&self) -> f64 {
        self.total_outliers() + self.total_inliers()
    }

    pub fn total_exposed(&self) -> f64 {
        self.exposed.total()
    }

    pub fn total_unexposed(&self) -> f64 {
        self.unexposed.total()
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            exposed_outliers: self.exposed.outliers,
            exposed_inliers: self.exposed.inliers,
            unexposed_outliers: self.unexposed.outliers,
            unexposed_inliers: self.unexposed.inliers,
            total_outliers: self.total_outliers(),
            total_inliers: self.total_inliers(),
            population: self.population(),
        }
    }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fraction of the whole population that matches the pattern.
pub fn support(table: &ContingencyTable) -> f64 {
    safe_ratio(table.total_exposed(), table.population())
}

/// Fraction of outliers that match the pattern.
pub fn outlier_support(table: &ContingencyTable) -> f64 {
    safe_ratio(table.exposed.outliers, table.total_outliers())
}

/// Fraction of inliers that match the pattern.
pub fn inlier_support(table: &ContingencyTable) -> f64 {
    safe_ratio(table.exposed.inliers, table.total_inliers())
}

/// Probability of being an outlier among exposed rows.
pub fn risk(table: &ContingencyTable) -> f64 {
    safe_ratio(table.exposed.outliers, table.total_exposed())
}

/// Probability of being an outlier among unexposed rows.
pub fn baseline_risk(table: &ContingencyTable) -> f64 {
    safe_ratio(table.unexposed.outliers, table.total_unexposed())
}

/// Relative risk of the exposed group.
///
/// `0` if either group is empty; `+inf` if the unexposed group has no
/// outliers.
pub fn risk_ratio(table: &ContingencyTable) -> f64 {
    let exposed_total = table.total_exposed();
    let unexposed_total = table.total_unexposed();
    if exposed_total == 0.0 || unexposed_total == 0.0 {
        return 0.0;
    }
    if table.unexposed.outliers == 0.0 {
        return f64::INFINITY;
    }
    (table.exposed.outliers / exposed_total) / (table.unexposed.outliers / unexposed_total)
}

/// Exposed risk minus baseline risk; `0` if either group is empty.
pub fn risk_difference(table: &ContingencyTable) -> f64 {
    let exposed_total = table.total_exposed();
    let unexposed_total = table.total_unexposed();
    if exposed_total == 0.0 || unexposed_total == 0.0 {
        return 0.0;
    }
    (table.exposed.outliers / exposed_total) - (table.unexposed.outliers / unexposed_total)
}

/// Lift of the rule `exposed -> outlier`. Values above 1 indicate a
/// positive association.
pub fn lift(table: &ContingencyTable) -> f64 {
    let population = table.population();
    let exposed_total = table.total_exposed();
    let total_outliers = table.total_outliers();
    if population == 0.0 || exposed_total == 0.0 || total_outliers == 0.0 {
        return 0.0;
    }
    (table.exposed.outliers / exposed_total) / (total_outliers / population)
}

/// Leverage of the rule `exposed -> outlier`:
/// `P(exposed & outlier) - P(exposed) * P(outlier)`.
pub fn leverage(table: &ContingencyTable) -> f64 {
    let population = table.population();
    if population == 0.0 {
        return 0.0;
    }
    let p_exposed_and_outlier = table.exposed.outliers / population;
    let p_exposed = table.total_exposed() / population;
    let p_outlier = table.total_outliers() / population;
    p_exposed_and_outlier - p_exposed * p_outlier
}

/// All table metrics computed together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    pub support: f64,
    pub outlier_support: f64,
    pub inlier_support: f64,
    pub risk: f64,
    pub baseline_risk: f64,
    pub risk_ratio: f64,
    pub risk_difference: f64,
    pub lift: f64,
    pub leverage: f64,
}

impl MetricBundle {
    pub const NAMES: [&'static str; 9] = [
        "support",
        "outlier_support",
        "inlier_support",
        "risk",
        "baseline_risk",
        "risk_ratio",
        "risk_difference",
        "lift",
        "leverage",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "support" => Some(self.support),
            "outlier_support" => Some(self.outlier_support),
            "inlier_support" => Some(self.inlier_support),
            "risk" => Some(self.risk),
            "baseline_risk" => Some(self.baseline_risk),
            "risk_ratio" => Some(self.risk_ratio),
            "risk_difference" => Some(self.risk_difference),
            "lift" => Some(self.lift),
            "leverage" => Some(self.leverage),
            _ => None,
        }
    }

    /// `(name, value)` pairs in [`MetricBundle::NAMES`] order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Self::NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }
}

pub fn compute_metrics(table: &ContingencyTable) -> MetricBundle {
    MetricBundle {
        support: support(table),
        outlier_support: outlier_support(table),
        inlier_support: inlier_support(table),
        risk: risk(table),
        baseline_risk: baseline_risk(table),
        risk_ratio: risk_ratio(table),
        risk_difference: risk_difference(table),
        lift: lift(table),
        leverage: leverage(table),
    }
}

/// Accumulate `metrics * weight` into a running summary, in place.
pub fn update_metric_summary(summary: &mut HashMap<String, f64>, metrics: &MetricBundle, weight: f64) {
    for (name, value) in metrics.entries() {
        *summary.entry(name.to_string()).or_insert(0.0) += value * weight;
    }
}
