use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SiftError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Load an explicitly named env file. Unlike `load_dotenv`, a missing or
/// malformed file is an error. Variables already set are kept.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<(), SiftError> {
    let path = path.as_ref();
    dotenvy::from_path(path)
        .map_err(|e| SiftError::ConfigParse(format!("{}: {}", path.display(), e)))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Parse a profiled env var, reporting the key on malformed input.
fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Result<Option<T>, SiftError> {
    match profiled_env_opt(profile, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SiftError::ConfigParse(format!("{} has unparsable value '{}'", key, raw))),
        None => Ok(None),
    }
}

/// Comma-separated list, empty entries dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Which search procedure generates candidate combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Level-wise search with subset-frequency pruning.
    #[default]
    #[serde(alias = "apriori")]
    Exhaustive,
    /// Beam search ranked by the ratio metric.
    #[serde(alias = "beam")]
    Heuristic,
}

impl std::str::FromStr for StrategyKind {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" | "apriori" => Ok(StrategyKind::Exhaustive),
            "heuristic" | "beam" => Ok(StrategyKind::Heuristic),
            other => Err(SiftError::InvalidConfig {
                field: "strategy",
                reason: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Exhaustive => write!(f, "exhaustive"),
            StrategyKind::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Configuration of a single explanation run, typically parsed from TOML
/// and optionally overridden from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Boolean / 0-1 column marking outlier rows.
    #[serde(default = "default_outlier_column")]
    pub outlier_column: String,
    /// Attribute columns to mine. None = every column except the outlier column.
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Minimum fraction of outliers a combination must cover, in (0, 1].
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    #[serde(default = "default_min_ratio_metric")]
    pub min_ratio_metric: f64,
    /// One of risk_ratio, risk_difference, support_outliers, support_total.
    #[serde(default = "default_ratio_metric")]
    pub ratio_metric: String,
    /// Largest combination size. None = number of attributes.
    #[serde(default)]
    pub max_order: Option<usize>,
    /// Result truncation. None = return the full ranked list.
    #[serde(default = "default_top_k")]
    pub top_k: Option<usize>,
    /// Heuristic strategy only.
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    /// Determinant attribute -> attributes it functionally determines.
    #[serde(default)]
    pub functional_dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub use_fd_hints: bool,
    /// 1 = sequential, 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Wall-clock bound on the search in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_outlier_column() -> String { "is_outlier".to_string() }
fn default_min_support() -> f64 { 0.1 }
fn default_min_ratio_metric() -> f64 { 1.0 }
fn default_ratio_metric() -> String { "risk_ratio".to_string() }
fn default_top_k() -> Option<usize> { Some(20) }
fn default_beam_width() -> usize { 10 }
fn default_worker_threads() -> usize { 1 }

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            outlier_column: default_outlier_column(),
            attributes: None,
            strategy: StrategyKind::default(),
            min_support: default_min_support(),
            min_ratio_metric: default_min_ratio_metric(),
            ratio_metric: default_ratio_metric(),
            max_order: None,
            top_k: default_top_k(),
            beam_width: default_beam_width(),
            functional_dependencies: BTreeMap::new(),
            use_fd_hints: false,
            worker_threads: default_worker_threads(),
            deadline_ms: None,
        }
    }
}

impl ExplainConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, SiftError> {
        toml::from_str(raw).map_err(|e| SiftError::ConfigParse(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SiftError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SiftError::ConfigParse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden from the environment (call `load_dotenv()` first).
    /// Profile is read from `SIFT_PROFILE`; when set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, SiftError> {
        let profile = env_or("SIFT_PROFILE", "").to_uppercase();
        let mut config = Self::default();
        config.apply_env(&profile)?;
        Ok(config)
    }

    /// Apply `SIFT_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self, profile: &str) -> Result<(), SiftError> {
        let p = profile.to_uppercase();
        let p = p.as_str();

        if let Some(v) = profiled_env_opt(p, "SIFT_OUTLIER_COLUMN") {
            self.outlier_column = v;
        }
        if let Some(v) = profiled_env_opt(p, "SIFT_ATTRIBUTES") {
            self.attributes = Some(split_list(&v));
        }
        if let Some(v) = profiled_env_opt(p, "SIFT_STRATEGY") {
            self.strategy = v.parse()?;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_MIN_SUPPORT")? {
            self.min_support = v;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_MIN_RATIO_METRIC")? {
            self.min_ratio_metric = v;
        }
        if let Some(v) = profiled_env_opt(p, "SIFT_RATIO_METRIC") {
            self.ratio_metric = v;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_MAX_ORDER")? {
            self.max_order = Some(v);
        }
        if let Some(v) = profiled_env_opt(p, "SIFT_TOP_K") {
            self.top_k = if v.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(v.trim().parse().map_err(|_| {
                    SiftError::ConfigParse(format!("SIFT_TOP_K has unparsable value '{}'", v))
                })?)
            };
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_BEAM_WIDTH")? {
            self.beam_width = v;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_USE_FD_HINTS")? {
            self.use_fd_hints = v;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_WORKER_THREADS")? {
            self.worker_threads = v;
        }
        if let Some(v) = profiled_env_parse(p, "SIFT_DEADLINE_MS")? {
            self.deadline_ms = Some(v);
        }
        Ok(())
    }

    /// Check the numeric bounds. Column and metric names are checked
    /// against the dataset when an explanation run starts.
    pub fn validate(&self) -> Result<(), SiftError> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(SiftError::InvalidConfig {
                field: "min_support",
                reason: format!("must lie in (0, 1], got {}", self.min_support),
            });
        }
        if self.min_ratio_metric.is_nan() {
            return Err(SiftError::InvalidConfig {
                field: "min_ratio_metric",
                reason: "must be a number".to_string(),
            });
        }
        if self.max_order == Some(0) {
            return Err(SiftError::InvalidConfig {
                field: "max_order",
                reason: "must be positive".to_string(),
            });
        }
        if self.strategy == StrategyKind::Heuristic && self.beam_width == 0 {
            return Err(SiftError::InvalidConfig {
                field: "beam_width",
                reason: "must be positive".to_string(),
            });
        }
        if self.outlier_column.is_empty() {
            return Err(SiftError::InvalidConfig {
                field: "outlier_column",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("Explain config:");
        tracing::info!("  strategy:    {} (beam_width={})", self.strategy, self.beam_width);
        tracing::info!(
            "  thresholds:  min_support={}, {}>={}",
            self.min_support,
            self.ratio_metric,
            self.min_ratio_metric
        );
        tracing::info!(
            "  bounds:      max_order={}, top_k={}, deadline_ms={}",
            self.max_order.map_or("auto".to_string(), |v| v.to_string()),
            self.top_k.map_or("none".to_string(), |v| v.to_string()),
            self.deadline_ms.map_or("none".to_string(), |v| v.to_string()),
        );
        tracing::info!(
            "  fd hints:    enabled={}, determinants={}",
            self.use_fd_hints,
            self.functional_dependencies.len()
        );
    }

    /// Compact JSON view for run metadata.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "strategy": self.strategy,
            "outlier_column": self.outlier_column,
            "attributes": self.attributes,
            "min_support": self.min_support,
            "ratio_metric": self.ratio_metric,
            "min_ratio_metric": self.min_ratio_metric,
            "max_order": self.max_order,
            "top_k": self.top_k,
            "beam_width": self.beam_width,
            "use_fd_hints": self.use_fd_hints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_documented_values() {
        let config = ExplainConfig::default();
        assert_eq!(config.outlier_column, "is_outlier");
        assert_eq!(config.min_support, 0.1);
        assert_eq!(config.ratio_metric, "risk_ratio");
        assert_eq!(config.top_k, Some(20));
        assert_eq!(config.beam_width, 10);
        assert_eq!(config.strategy, StrategyKind::Exhaustive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = ExplainConfig::from_toml_str(
            r#"
            strategy = "beam"
            min_support = 0.2
            max_order = 3
            use_fd_hints = true

            [functional_dependencies]
            region = ["zip"]
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, StrategyKind::Heuristic);
        assert_eq!(config.min_support, 0.2);
        assert_eq!(config.max_order, Some(3));
        assert_eq!(config.functional_dependencies["region"], vec!["zip".to_string()]);
        assert_eq!(config.beam_width, 10);
    }

    #[test]
    fn toml_file_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ratio_metric = \"risk_difference\"\ntop_k = 5").unwrap();
        let config = ExplainConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.ratio_metric, "risk_difference");
        assert_eq!(config.top_k, Some(5));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ExplainConfig::from_toml_str("min_support = \"lots\"").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        let mut config = ExplainConfig::default();
        config.min_support = 0.0;
        assert!(matches!(config.validate(), Err(SiftError::InvalidConfig { field: "min_support", .. })));

        let mut config = ExplainConfig::default();
        config.max_order = Some(0);
        assert!(matches!(config.validate(), Err(SiftError::InvalidConfig { field: "max_order", .. })));

        let mut config = ExplainConfig::default();
        config.strategy = StrategyKind::Heuristic;
        config.beam_width = 0;
        assert!(matches!(config.validate(), Err(SiftError::InvalidConfig { field: "beam_width", .. })));
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("apriori".parse::<StrategyKind>().unwrap(), StrategyKind::Exhaustive);
        assert_eq!("Beam".parse::<StrategyKind>().unwrap(), StrategyKind::Heuristic);
        assert!("random".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn profiled_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("CFGTEST_SIFT_MIN_SUPPORT", "0.25");
        env::set_var("CFGTEST_SIFT_ATTRIBUTES", "region, browser,");
        env::set_var("CFGTEST_SIFT_TOP_K", "none");
        let mut config = ExplainConfig::default();
        config.apply_env("cfgtest").unwrap();
        assert_eq!(config.min_support, 0.25);
        assert_eq!(
            config.attributes,
            Some(vec!["region".to_string(), "browser".to_string()])
        );
        assert_eq!(config.top_k, None);

        env::set_var("BADTEST_SIFT_BEAM_WIDTH", "wide");
        let err = ExplainConfig::default().apply_env("badtest").unwrap_err();
        assert!(matches!(err, SiftError::ConfigParse(_)));
    }

    #[test]
    fn from_env_reads_the_selected_profile() {
        let _guard = ENV_LOCK.lock().unwrap();
        load_dotenv();
        env::set_var("SIFT_PROFILE", "envtest");
        env::set_var("ENVTEST_SIFT_BEAM_WIDTH", "7");
        env::set_var("ENVTEST_SIFT_STRATEGY", "beam");
        let config = ExplainConfig::from_env();
        env::remove_var("SIFT_PROFILE");
        env::remove_var("ENVTEST_SIFT_BEAM_WIDTH");
        env::remove_var("ENVTEST_SIFT_STRATEGY");

        let config = config.unwrap();
        assert_eq!(config.beam_width, 7);
        assert_eq!(config.strategy, StrategyKind::Heuristic);
        assert_eq!(config.min_support, 0.1);
    }

    #[test]
    fn env_file_feeds_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SIFT_PROFILE=dotenvtest").unwrap();
        writeln!(file, "DOTENVTEST_SIFT_TOP_K=5").unwrap();
        writeln!(file, "DOTENVTEST_SIFT_OUTLIER_COLUMN=flagged").unwrap();
        load_env_file(file.path()).unwrap();
        let config = ExplainConfig::from_env();
        env::remove_var("SIFT_PROFILE");
        env::remove_var("DOTENVTEST_SIFT_TOP_K");
        env::remove_var("DOTENVTEST_SIFT_OUTLIER_COLUMN");

        let config = config.unwrap();
        assert_eq!(config.top_k, Some(5));
        assert_eq!(config.outlier_column, "flagged");

        let err = load_env_file(file.path().with_extension("missing")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn summary_reports_search_settings() {
        let summary = ExplainConfig {
            strategy: StrategyKind::Heuristic,
            beam_width: 4,
            attributes: Some(vec!["region".to_string()]),
            ..Default::default()
        }
        .summary();
        assert_eq!(summary["strategy"], "heuristic");
        assert_eq!(summary["beam_width"], 4);
        assert_eq!(summary["top_k"], 20);
        assert_eq!(summary["attributes"][0], "region");
        assert_eq!(summary["max_order"], serde_json::Value::Null);
        assert_eq!(summary["use_fd_hints"], false);
    }
}
