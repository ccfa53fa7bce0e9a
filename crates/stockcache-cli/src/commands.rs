//! Command handlers for the CLI.
//!
//! Each handler builds the cache it needs from the shared record source,
//! performs one lookup and prints pretty JSON on stdout. Logs go to stderr.

use std::sync::Arc;

use serde_json::json;
use stockcache_cache::{MetricsCache, MetricsCacheConfig, PriceLookupConfig, PriceLookupService};
use stockcache_core::{AppConfig, Scope};
use stockcache_source::RecordSource;
use uuid::Uuid;

/// Resolves the `--category` / `--supplier` flags to a scope. clap rejects
/// both being set.
pub(crate) fn scope_from_flags(category: Option<Uuid>, supplier: Option<Uuid>) -> Scope {
    match (category, supplier) {
        (Some(id), _) => Scope::Category(id),
        (None, Some(id)) => Scope::Supplier(id),
        (None, None) => Scope::Global,
    }
}

pub(crate) async fn run_metrics(
    source: Arc<dyn RecordSource>,
    config: &AppConfig,
    category: Option<Uuid>,
    supplier: Option<Uuid>,
    or_empty: bool,
) -> anyhow::Result<()> {
    let cache = MetricsCache::new(source, MetricsCacheConfig::from_app_config(config));
    let scope = scope_from_flags(category, supplier);

    let snapshot = if or_empty {
        cache.get_or_empty(&scope).await
    } else {
        cache.get(&scope).await?
    };

    let output = json!({
        "scope": scope,
        "metrics": snapshot,
        "inactive_products": snapshot.inactive_products(),
        "healthy_stock_count": snapshot.healthy_stock_count(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// # Errors
///
/// Without `report`, fails when none of the requested prices could be
/// fetched. With `report`, only fails if the output cannot be serialized.
pub(crate) async fn run_prices(
    source: Arc<dyn RecordSource>,
    config: &AppConfig,
    product_ids: &[Uuid],
    report: bool,
) -> anyhow::Result<()> {
    let prices = PriceLookupService::new(source, PriceLookupConfig::from_app_config(config));

    let output = if report {
        let report = prices.fetch_prices_report(product_ids).await;
        json!({
            "records": report.records,
            "failed_product_ids": report.failed_product_ids,
        })
    } else {
        serde_json::to_value(prices.fetch_prices(product_ids).await?)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(crate) async fn run_sku(
    source: Arc<dyn RecordSource>,
    config: &AppConfig,
    sku: &str,
) -> anyhow::Result<()> {
    let prices = PriceLookupService::new(source, PriceLookupConfig::from_app_config(config));
    let record = prices.fetch_price_by_sku(sku).await?;
    if record.is_none() {
        tracing::info!(sku, "no variant carries this sku");
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
