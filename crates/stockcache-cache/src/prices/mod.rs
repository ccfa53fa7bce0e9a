//! Per-variant price lookups behind a watermark-expired cache.
//!
//! [`PriceLookupService::fetch_prices`] serves what it can from the cache and
//! fetches the rest from the [`RecordSource`] in small batches. A batch that
//! keeps failing is retried with exponential backoff, then abandoned in favour
//! of one request per product id. Only when nothing at all could be fetched
//! does the call fail.

mod batch;
mod state;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::FutureExt;
use stockcache_core::{AppConfig, PriceRecord};
use stockcache_source::{RecordSource, SourceError};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CacheError;
use crate::flight::InFlight;
use batch::FetchOutcome;
use state::PriceCacheState;

/// Tuning for [`PriceLookupService`].
#[derive(Debug, Clone)]
pub struct PriceLookupConfig {
    /// Lifetime of the shared watermark.
    pub ttl: Duration,
    /// Product ids per remote request. Kept small to respect the record
    /// source's request size limit.
    pub batch_size: usize,
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// Failed attempt `n` is followed by a sleep of `backoff_base × 2^n`.
    pub backoff_base: Duration,
    /// Batches in flight at once within one fetch. `1` runs them in order.
    pub batch_concurrency: usize,
    /// Pause before every batch after the first.
    pub inter_batch_delay: Duration,
}

impl Default for PriceLookupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            batch_size: 5,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            batch_concurrency: 1,
            inter_batch_delay: Duration::ZERO,
        }
    }
}

impl PriceLookupConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.price_ttl_secs),
            batch_size: config.price_batch_size,
            max_attempts: config.price_max_attempts,
            backoff_base: Duration::from_secs(config.price_backoff_base_secs),
            batch_concurrency: config.price_batch_concurrency,
            inter_batch_delay: Duration::from_millis(config.price_inter_batch_delay_ms),
        }
    }
}

/// Outcome of [`PriceLookupService::fetch_prices_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceFetchReport {
    /// Requested-id order, each product's variants in source order, no
    /// repeated `(product_id, variant_id)` pairs.
    pub records: Vec<PriceRecord>,
    /// Requested ids whose prices could not be fetched.
    pub failed_product_ids: Vec<Uuid>,
}

pub(crate) struct PriceInner {
    source: Arc<dyn RecordSource>,
    config: PriceLookupConfig,
    state: RwLock<PriceCacheState>,
    product_flights: InFlight<Uuid, Arc<FetchOutcome>>,
    sku_flights: InFlight<String, Result<Option<PriceRecord>, CacheError>>,
}

impl PriceInner {
    fn read_state(&self) -> RwLockReadGuard<'_, PriceCacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PriceCacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Lookup {
    report: PriceFetchReport,
    /// Distinct ids requested.
    requested: usize,
    first_failure: Option<Arc<SourceError>>,
}

/// Price cache over a [`RecordSource`].
///
/// Construct one per process and share it by cloning; clones share the same
/// cache and in-flight fetches.
#[derive(Clone)]
pub struct PriceLookupService {
    inner: Arc<PriceInner>,
}

impl PriceLookupService {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, config: PriceLookupConfig) -> Self {
        Self {
            inner: Arc::new(PriceInner {
                source,
                config,
                state: RwLock::new(PriceCacheState::default()),
                product_flights: InFlight::default(),
                sku_flights: InFlight::default(),
            }),
        }
    }

    /// Price records for every variant of the requested products.
    ///
    /// Products that could not be fetched are logged and left out; use
    /// [`fetch_prices_report`](Self::fetch_prices_report) to learn which.
    ///
    /// # Errors
    ///
    /// Fails only when not one requested product could be resolved, from the
    /// cache or remotely. The error is [`CacheError::ContractViolation`] when
    /// the source answered with malformed data, otherwise
    /// [`CacheError::RemoteUnavailable`].
    pub async fn fetch_prices(&self, product_ids: &[Uuid]) -> Result<Vec<PriceRecord>, CacheError> {
        let lookup = self.lookup(product_ids).await;
        let failed = lookup.report.failed_product_ids.len();

        if failed > 0 && failed == lookup.requested {
            let source = lookup.first_failure.unwrap_or_else(|| {
                Arc::new(SourceError::Unavailable(
                    "no price records could be fetched".to_owned(),
                ))
            });
            return Err(CacheError::from_shared_source(
                format!("prices for {failed} product id(s)"),
                source,
            ));
        }
        if failed > 0 {
            warn!(
                failed,
                requested = lookup.requested,
                "some product prices could not be fetched"
            );
        }
        Ok(lookup.report.records)
    }

    /// Like [`fetch_prices`](Self::fetch_prices), but reports failed ids to
    /// the caller instead of failing the call.
    pub async fn fetch_prices_report(&self, product_ids: &[Uuid]) -> PriceFetchReport {
        self.lookup(product_ids).await.report
    }

    async fn lookup(&self, product_ids: &[Uuid]) -> Lookup {
        let mut seen = HashSet::new();
        let requested: Vec<Uuid> = product_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut resolved: HashMap<Uuid, Arc<Vec<PriceRecord>>> = HashMap::new();
        let mut uncached = Vec::new();
        {
            let state = self.inner.read_state();
            let fresh = state.is_fresh(self.inner.config.ttl);
            for id in &requested {
                match state.product(id).filter(|_| fresh) {
                    Some(list) => {
                        resolved.insert(*id, list);
                    }
                    None => uncached.push(*id),
                }
            }
        }
        debug!(
            requested = requested.len(),
            cached = resolved.len(),
            uncached = uncached.len(),
            "price lookup"
        );

        let mut first_failure = None;
        if !uncached.is_empty() {
            let inner = Arc::clone(&self.inner);
            let outcomes = self
                .inner
                .product_flights
                .run_many(&uncached, move |ids| inner.fetch_uncached(ids).boxed())
                .await;

            for id in &uncached {
                if let Some(list) = outcomes.iter().find_map(|o| o.lists.get(id)) {
                    resolved.insert(*id, Arc::clone(list));
                } else if first_failure.is_none() {
                    first_failure = outcomes
                        .iter()
                        .find_map(|o| o.failures.get(id))
                        .map(Arc::clone);
                }
            }
        }

        let mut pairs = HashSet::new();
        let mut report = PriceFetchReport::default();
        for id in &requested {
            match resolved.get(id) {
                Some(list) => report.records.extend(
                    list.iter()
                        .filter(|r| pairs.insert((r.product_id, r.variant_id)))
                        .cloned(),
                ),
                None => report.failed_product_ids.push(*id),
            }
        }

        Lookup {
            report,
            requested: requested.len(),
            first_failure,
        }
    }

    /// The price record carrying `sku`, or `None` when no variant has it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::RemoteUnavailable`] when the remote lookup keeps
    /// failing, or [`CacheError::ContractViolation`] for a malformed answer.
    pub async fn fetch_price_by_sku(&self, sku: &str) -> Result<Option<PriceRecord>, CacheError> {
        {
            let state = self.inner.read_state();
            if state.is_fresh(self.inner.config.ttl) {
                if let Some(record) = state.find_sku(sku) {
                    debug!(sku, "sku served from cache");
                    return Ok(Some(record));
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        let key = sku.to_owned();
        self.inner
            .sku_flights
            .run(key.clone(), move || inner.lookup_sku(key).boxed())
            .await
    }

    /// Empties the cache and resets the watermark to "never". In-flight
    /// fetches finish for their callers but do not write back.
    pub fn clear_cache(&self) {
        self.inner.write_state().clear();
        self.inner.product_flights.forget_all();
        self.inner.sku_flights.forget_all();
        info!("price cache cleared");
    }

    /// Number of product ids with a cached list, fresh or not.
    #[must_use]
    pub fn cached_product_count(&self) -> usize {
        self.inner.read_state().product_count()
    }

    /// When the shared watermark was last moved, or `None` if never.
    #[must_use]
    pub fn last_refreshed(&self) -> Option<Instant> {
        self.inner.read_state().last_refreshed()
    }

    #[must_use]
    pub fn config(&self) -> &PriceLookupConfig {
        &self.inner.config
    }
}
