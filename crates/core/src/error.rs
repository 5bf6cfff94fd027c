use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SiftError {
    #[error("Outlier column '{0}' not found in dataset")]
    MissingOutlierColumn(String),

    #[error("Attributes missing from dataset: {0:?}")]
    MissingAttributes(Vec<String>),

    #[error("Unsupported ratio metric: {0}")]
    UnsupportedMetric(String),

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Attribute '{attribute}' contains a null value at row {row}")]
    NullAttribute { attribute: String, row: usize },

    #[error("Attribute '{attribute}' contains a non-finite value at row {row}")]
    NonFiniteAttribute { attribute: String, row: usize },

    #[error("Outlier column '{column}' holds a non-boolean value at row {row}")]
    InvalidOutlierFlag { column: String, row: usize },

    #[error("At least one outlier is required for summarization")]
    NoOutliers,

    #[error("At least one inlier is required for summarization")]
    NoInliers,

    #[error("Invalid counts: {0}")]
    InvalidCounts(String),

    #[error("Invalid contingency table: {0}")]
    InvalidTable(String),

    #[error("Row has {actual} values but dataset declares {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl SiftError {
    /// Caller misconfiguration: bad column names, metric names or bounds.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SiftError::MissingOutlierColumn(_)
                | SiftError::MissingAttributes(_)
                | SiftError::UnsupportedMetric(_)
                | SiftError::InvalidConfig { .. }
                | SiftError::ConfigParse(_)
        )
    }

    /// The dataset itself cannot be summarized.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SiftError::NullAttribute { .. }
                | SiftError::NonFiniteAttribute { .. }
                | SiftError::InvalidOutlierFlag { .. }
                | SiftError::NoOutliers
                | SiftError::NoInliers
                | SiftError::RowWidth { .. }
        )
    }
}
