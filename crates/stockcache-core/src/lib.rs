pub mod app_config;
pub mod config;
pub mod products;
pub mod scope;
pub mod valuation;

pub use app_config::{AppConfig, Environment, SourceKind};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{PriceRecord, Product, Variant, VariantRecord};
pub use scope::{ProductFilter, Scope};
pub use valuation::{
    compute_metrics, compute_metrics_at, stock_status, MetricsSnapshot, StockStatus,
    LOW_STOCK_THRESHOLD,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
