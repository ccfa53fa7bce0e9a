//! In-memory price cache keyed by product id, with one shared watermark.
//!
//! There is no per-key expiry: every entry is valid exactly while the global
//! `last_refreshed` watermark is younger than the TTL. Each product id maps to
//! a whole `Arc<Vec<PriceRecord>>` that is swapped, never edited, so a reader
//! holding a list never sees it half-written.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use stockcache_core::PriceRecord;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct PriceCacheState {
    products: HashMap<Uuid, Arc<Vec<PriceRecord>>>,
    /// Results of standalone SKU lookups. Never merged into `products`.
    by_sku: HashMap<String, PriceRecord>,
    /// `None` means "never", i.e. the epoch.
    last_refreshed: Option<Instant>,
    /// Bumped by [`clear`](Self::clear); fetches that began under an older
    /// generation must not write back.
    generation: u64,
}

impl PriceCacheState {
    pub(crate) fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_refreshed
            .is_some_and(|refreshed| refreshed.elapsed() < ttl)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// The cached list for `product_id`, ignoring freshness.
    pub(crate) fn product(&self, product_id: &Uuid) -> Option<Arc<Vec<PriceRecord>>> {
        self.products.get(product_id).map(Arc::clone)
    }

    /// Searches cached product lists first, then standalone SKU results.
    pub(crate) fn find_sku(&self, sku: &str) -> Option<PriceRecord> {
        self.products
            .values()
            .flat_map(|records| records.iter())
            .find(|record| record.sku == sku)
            .or_else(|| self.by_sku.get(sku))
            .cloned()
    }

    /// Replaces the lists for every product in `lists` and refreshes the
    /// watermark. Returns `false` (and writes nothing) when `generation` is
    /// stale.
    pub(crate) fn store_products(
        &mut self,
        generation: u64,
        lists: impl IntoIterator<Item = (Uuid, Arc<Vec<PriceRecord>>)>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.products.extend(lists);
        self.last_refreshed = Some(Instant::now());
        true
    }

    /// Records a standalone SKU lookup result and refreshes the watermark.
    pub(crate) fn store_sku(&mut self, generation: u64, record: PriceRecord) -> bool {
        if generation != self.generation {
            return false;
        }
        self.by_sku.insert(record.sku.clone(), record);
        self.last_refreshed = Some(Instant::now());
        true
    }

    pub(crate) fn clear(&mut self) {
        self.products.clear();
        self.by_sku.clear();
        self.last_refreshed = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn product_count(&self) -> usize {
        self.products.len()
    }

    pub(crate) fn last_refreshed(&self) -> Option<Instant> {
        self.last_refreshed
    }
}
