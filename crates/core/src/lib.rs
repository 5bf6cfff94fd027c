pub mod config;
pub mod dataset;
pub mod error;

pub use config::{ExplainConfig, StrategyKind};
pub use dataset::*;
pub use error::*;
