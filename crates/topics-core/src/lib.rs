//! Shared domain types, configuration, and the trend calculator.

mod app_config;
mod config;
pub mod tone;
pub mod trend;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use tone::{ToneBin, ToneChartDocument};
pub use trend::trend;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
