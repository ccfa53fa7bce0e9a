mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use stockcache_core::{AppConfig, SourceKind};
use stockcache_source::{RecordSource, RestRecordSource};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "stockcache")]
#[command(about = "Inventory valuation and price lookups over a record source")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the inventory metrics snapshot for a scope
    Metrics {
        /// Restrict to one category
        #[arg(long, conflicts_with = "supplier")]
        category: Option<Uuid>,
        /// Restrict to one supplier
        #[arg(long)]
        supplier: Option<Uuid>,
        /// Print an all-zero snapshot instead of failing when the source is down
        #[arg(long)]
        or_empty: bool,
    },
    /// Print price records for every variant of the given products
    Prices {
        #[arg(required = true, num_args = 1..)]
        product_ids: Vec<Uuid>,
        /// Include ids that could not be fetched instead of failing
        #[arg(long)]
        report: bool,
    },
    /// Print the price record for one SKU, or null
    Sku { sku: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = stockcache_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let source = build_source(&config).await?;
    tracing::debug!(source = %config.source, env = %config.env, "record source ready");

    match cli.command {
        Commands::Metrics {
            category,
            supplier,
            or_empty,
        } => commands::run_metrics(source, &config, category, supplier, or_empty).await,
        Commands::Prices {
            product_ids,
            report,
        } => commands::run_prices(source, &config, &product_ids, report).await,
        Commands::Sku { sku } => commands::run_sku(source, &config, &sku).await,
    }
}

/// Builds the configured record source. The Postgres pool is pinged once so
/// a bad `DATABASE_URL` fails here rather than on the first query.
async fn build_source(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordSource>> {
    match config.source {
        SourceKind::Rest => {
            let base_url = config
                .rest_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("STOCKCACHE_REST_URL is not set"))?;
            let source = RestRecordSource::new(
                base_url,
                config.rest_api_key.as_deref(),
                config.request_timeout_secs,
                &config.user_agent,
            )?;
            Ok(Arc::new(source))
        }
        SourceKind::Postgres => {
            let pool = stockcache_db::connect_pool_from_app_config(config).await?;
            stockcache_db::ping(&pool).await?;
            Ok(Arc::new(stockcache_db::PgRecordSource::new(pool)))
        }
    }
}
