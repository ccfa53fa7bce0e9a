//! Remote fetch paths for the price cache: bounded batches with retry and
//! backoff, the per-product fallback, and single SKU lookups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use stockcache_core::{PriceRecord, VariantRecord};
use stockcache_source::SourceError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::PriceInner;
use crate::error::CacheError;
use crate::retry::{retry_with_backoff, RetryExhausted};

/// Result of one fetch job. Every product id handed to the job ends up in
/// exactly one of the two maps.
#[derive(Debug, Default)]
pub(crate) struct FetchOutcome {
    pub lists: HashMap<Uuid, Arc<Vec<PriceRecord>>>,
    pub failures: HashMap<Uuid, Arc<SourceError>>,
}

impl FetchOutcome {
    fn absorb(&mut self, other: FetchOutcome) {
        self.lists.extend(other.lists);
        self.failures.extend(other.failures);
    }
}

impl PriceInner {
    /// Fetches `ids` in batches and writes the successful lists back under
    /// the generation observed when the job began.
    pub(super) async fn fetch_uncached(self: Arc<Self>, ids: Vec<Uuid>) -> Arc<FetchOutcome> {
        let generation = self.read_state().generation();
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<Uuid>> = ids.chunks(batch_size).map(<[Uuid]>::to_vec).collect();
        let batch_count = batches.len();

        let this: &PriceInner = &self;
        let results: Vec<FetchOutcome> = stream::iter(batches.into_iter().enumerate())
            .map(move |(index, batch)| this.fetch_batch(index, batch))
            .buffered(self.config.batch_concurrency.max(1))
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        for result in results {
            outcome.absorb(result);
        }

        if !outcome.lists.is_empty() {
            let lists = outcome
                .lists
                .iter()
                .map(|(id, list)| (*id, Arc::clone(list)));
            let stored = self.write_state().store_products(generation, lists);
            if !stored {
                debug!("price cache cleared while fetching, results not stored");
            }
        }

        info!(
            requested = ids.len(),
            batches = batch_count,
            fetched = outcome.lists.len(),
            failed = outcome.failures.len(),
            "price fetch complete"
        );
        Arc::new(outcome)
    }

    async fn fetch_batch(&self, index: usize, batch: Vec<Uuid>) -> FetchOutcome {
        if index > 0 && !self.config.inter_batch_delay.is_zero() {
            tokio::time::sleep(self.config.inter_batch_delay).await;
        }

        let source = &*self.source;
        let ids = batch.as_slice();
        let fetched = retry_with_backoff(self.config.max_attempts, self.config.backoff_base, move || {
            source.query_variants_by_product_ids(ids)
        })
        .await;

        match fetched {
            Ok(records) => {
                debug!(
                    batch = index,
                    size = batch.len(),
                    records = records.len(),
                    "price batch fetched"
                );
                FetchOutcome {
                    lists: group_records(&batch, records)
                        .into_iter()
                        .map(|(id, list)| (id, Arc::new(list)))
                        .collect(),
                    failures: HashMap::new(),
                }
            }
            Err(RetryExhausted { error, attempts }) => {
                let exhausted = CacheError::BatchExhausted {
                    batch_size: batch.len(),
                    attempts,
                    source: Arc::new(error),
                };
                warn!(
                    batch = index,
                    error = %exhausted,
                    "price batch abandoned, fetching products individually"
                );
                self.fetch_individually(&batch).await
            }
        }
    }

    /// One request per product id. Failures are logged and recorded, never
    /// propagated, so one unreachable product cannot sink the others.
    async fn fetch_individually(&self, batch: &[Uuid]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        for &product_id in batch {
            match self.source.query_variants_by_product_ids(&[product_id]).await {
                Ok(records) => {
                    let list = group_records(&[product_id], records)
                        .remove(&product_id)
                        .unwrap_or_default();
                    outcome.lists.insert(product_id, Arc::new(list));
                }
                Err(err) if err.is_not_found() => {
                    outcome.lists.insert(product_id, Arc::new(Vec::new()));
                }
                Err(err) => {
                    error!(
                        product_id = %product_id,
                        error = %err,
                        "individual price fetch failed"
                    );
                    outcome.failures.insert(product_id, Arc::new(err));
                }
            }
        }
        outcome
    }

    /// Retried remote lookup of one SKU. A hit goes into the SKU index and
    /// refreshes the watermark.
    pub(super) async fn lookup_sku(
        self: Arc<Self>,
        sku: String,
    ) -> Result<Option<PriceRecord>, CacheError> {
        let generation = self.read_state().generation();
        let source = &*self.source;
        let sku_ref = sku.as_str();
        let found = retry_with_backoff(self.config.max_attempts, self.config.backoff_base, move || {
            source.query_variant_by_sku(sku_ref)
        })
        .await;

        match found {
            Ok(Some(variant)) => {
                let record = PriceRecord::from(variant);
                self.write_state().store_sku(generation, record.clone());
                debug!(sku = %sku, "sku fetched from record source");
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(RetryExhausted { error, .. }) if error.is_not_found() => Ok(None),
            Err(RetryExhausted { error, attempts }) => {
                warn!(sku = %sku, attempts, error = %error, "sku lookup failed");
                Err(CacheError::from_source(format!("price for sku {sku}"), error))
            }
        }
    }
}

/// Groups variant rows by product. Every id in `batch` gets an entry, empty
/// when it has no variants. Repeated `(product, variant)` pairs are kept once;
/// rows for products outside `batch` are logged and dropped.
pub(crate) fn group_records(
    batch: &[Uuid],
    records: Vec<VariantRecord>,
) -> HashMap<Uuid, Vec<PriceRecord>> {
    let mut lists: HashMap<Uuid, Vec<PriceRecord>> =
        batch.iter().map(|id| (*id, Vec::new())).collect();
    let mut seen = HashSet::new();

    for record in records {
        let product_id = record.product_id;
        let Some(list) = lists.get_mut(&product_id) else {
            let violation = CacheError::ContractViolation {
                context: "product_variants by product_id".to_owned(),
                reason: format!("variant {} belongs to unrequested product {product_id}", record.id),
            };
            warn!(error = %violation, "discarding variant outside the requested batch");
            continue;
        };
        if seen.insert((product_id, record.id)) {
            list.push(PriceRecord::from(record));
        }
    }
    lists
}
