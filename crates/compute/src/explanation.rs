use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sift_core::{AttributeValue, SiftError};

use crate::metrics::{inlier_support, outlier_support, support, ContingencyTable};

/// Effect-size metric used for thresholding and ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioMetric {
    RiskRatio,
    RiskDifference,
    SupportOutliers,
    SupportTotal,
}

impl RatioMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatioMetric::RiskRatio => "risk_ratio",
            RatioMetric::RiskDifference => "risk_difference",
            RatioMetric::SupportOutliers => "support_outliers",
            RatioMetric::SupportTotal => "support_total",
        }
    }

    pub fn of(&self, metrics: &ExplanationMetrics) -> f64 {
        match self {
            RatioMetric::RiskRatio => metrics.risk_ratio,
            RatioMetric::RiskDifference => metrics.risk_difference,
            RatioMetric::SupportOutliers => metrics.support_outliers,
            RatioMetric::SupportTotal => metrics.support_total,
        }
    }

    /// Metric value of an explanation; None when undefined (NaN).
    pub fn value(&self, explanation: &Explanation) -> Option<f64> {
        Some(self.of(&explanation.metrics())).filter(|v| !v.is_nan())
    }
}

impl FromStr for RatioMetric {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "risk_ratio" => Ok(RatioMetric::RiskRatio),
            "risk_difference" => Ok(RatioMetric::RiskDifference),
            "support_outliers" => Ok(RatioMetric::SupportOutliers),
            "support_total" => Ok(RatioMetric::SupportTotal),
            other => Err(SiftError::UnsupportedMetric(other.to_string())),
        }
    }
}

impl fmt::Display for RatioMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six metrics reported for a candidate combination.
///
/// Supports come from the candidate's contingency table; the ratio and
/// difference compare outlier support with inlier support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplanationMetrics {
    pub support_outliers: f64,
    pub support_inliers: f64,
    pub support_total: f64,
    /// `+inf` when no inlier matches but some outlier does.
    pub risk_ratio: f64,
    pub risk_difference: f64,
    /// Difference-of-proportions z-score.
    pub significance: f64,
}

impl ExplanationMetrics {
    pub fn from_table(table: &ContingencyTable) -> Self {
        let support_outliers = outlier_support(table);
        let support_inliers = inlier_support(table);
        let support_total = support(table);

        let risk_ratio = if support_inliers == 0.0 {
            if support_outliers > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            support_outliers / support_inliers
        };
        let risk_difference = support_outliers - support_inliers;

        let population = table.population();
        let pooled = if population == 0.0 {
            0.0
        } else {
            table.total_exposed() / population
        };
        let variance = pooled * (1.0 - pooled);
        let mut denom = 0.0;
        if table.total_outliers() > 0.0 {
            denom += 1.0 / table.total_outliers();
        }
        if table.total_inliers() > 0.0 {
            denom += 1.0 / table.total_inliers();
        }
        let significance = if variance == 0.0 || denom == 0.0 {
            0.0
        } else {
            risk_difference / (variance * denom).sqrt()
        };

        Self {
            support_outliers,
            support_inliers,
            support_total,
            risk_ratio,
            risk_difference,
            significance,
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "support_outliers" | "outlier_support" => Some(self.support_outliers),
            "support_inliers" | "inlier_support" => Some(self.support_inliers),
            "support_total" | "support" => Some(self.support_total),
            "risk_ratio" => Some(self.risk_ratio),
            "risk_difference" => Some(self.risk_difference),
            "significance" => Some(self.significance),
            _ => None,
        }
    }
}

/// A combination over-represented among outliers, with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// Attribute -> value, ordered by attribute name.
    pub attributes: BTreeMap<String, AttributeValue>,
    pub support_outliers: f64,
    pub support_inliers: f64,
    pub support_total: f64,
    pub risk_ratio: f64,
    pub risk_difference: f64,
    pub significance: f64,
}

impl Explanation {
    pub fn new(attributes: BTreeMap<String, AttributeValue>, metrics: ExplanationMetrics) -> Self {
        Self {
            attributes,
            support_outliers: metrics.support_outliers,
            support_inliers: metrics.support_inliers,
            support_total: metrics.support_total,
            risk_ratio: metrics.risk_ratio,
            risk_difference: metrics.risk_difference,
            significance: metrics.significance,
        }
    }

    pub fn metrics(&self) -> ExplanationMetrics {
        ExplanationMetrics {
            support_outliers: self.support_outliers,
            support_inliers: self.support_inliers,
            support_total: self.support_total,
            risk_ratio: self.risk_ratio,
            risk_difference: self.risk_difference,
            significance: self.significance,
        }
    }

    pub fn order(&self) -> usize {
        self.attributes.len()
    }

    /// Display-ready strings for reporting layers.
    pub fn to_report(&self) -> ExplanationReport {
        ExplanationReport {
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            outlier_support: fmt_percent(self.support_outliers),
            inlier_support: fmt_percent(self.support_inliers),
            overall_support: fmt_percent(self.support_total),
            risk_ratio: fmt_ratio(self.risk_ratio),
            risk_difference: fmt_percent(self.risk_difference),
            significance_z: format!("{:.2}", self.significance),
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(
            f,
            "Explanation({}; outlier_support={:.3}, inlier_support={:.3}, risk_ratio={}, risk_difference={:.3}, significance_z={:.2})",
            parts.join(", "),
            self.support_outliers,
            self.support_inliers,
            fmt_ratio(self.risk_ratio),
            self.risk_difference,
            self.significance,
        )
    }
}

/// String rendering of an [`Explanation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationReport {
    pub attributes: BTreeMap<String, String>,
    pub outlier_support: String,
    pub inlier_support: String,
    pub overall_support: String,
    pub risk_ratio: String,
    pub risk_difference: String,
    pub significance_z: String,
}

/// Render a ranked list as a JSON array of reports.
pub fn reports_json(explanations: &[Explanation]) -> serde_json::Value {
    serde_json::Value::Array(
        explanations
            .iter()
            .map(|e| serde_json::json!(e.to_report()))
            .collect(),
    )
}

fn fmt_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn fmt_ratio(value: f64) -> String {
    if value == f64::INFINITY {
        "∞".to_string()
    } else {
        format!("{:.2}", value)
    }
}
