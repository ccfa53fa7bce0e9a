//! In-memory `RecordSource` spy shared by the cache integration tests.
//!
//! Counts every query, can be told to fail for chosen product ids or for SKU
//! lookups, and can add latency so concurrent callers overlap under paused
//! tokio time.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use stockcache_core::{Product, ProductFilter, Variant, VariantRecord};
use stockcache_source::{RecordSource, SourceError};
use tokio::time::Instant;
use uuid::Uuid;

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn ids(range: std::ops::RangeInclusive<u128>) -> Vec<Uuid> {
    range.map(id).collect()
}

pub fn variant(id: Uuid, sku: &str, quantity: i64, cost: Decimal, price: Decimal) -> Variant {
    Variant {
        id,
        sku: sku.to_owned(),
        name: sku.to_lowercase(),
        quantity,
        cost_price: cost,
        selling_price: price,
        min_quantity: 0,
    }
}

/// Product `n` with `variants` variants. Variant `i` has id `n * 100 + i` and
/// SKU `SKU-{n}-{i}`.
pub fn product(n: u128, variants: u128) -> Product {
    Product {
        id: id(n),
        name: format!("product {n}"),
        is_active: true,
        is_featured: false,
        category_id: None,
        supplier_id: None,
        variants: (0..variants)
            .map(|i| {
                variant(
                    id(n * 100 + i),
                    &format!("SKU-{n}-{i}"),
                    5,
                    Decimal::new(400, 2),
                    Decimal::new(999, 2),
                )
            })
            .collect(),
    }
}

pub fn catalog(range: std::ops::RangeInclusive<u128>) -> Vec<Product> {
    range.map(|n| product(n, 1)).collect()
}

/// Scripted failure for every SKU lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkuFailure {
    Outage,
    NotFound,
    Malformed,
}

pub struct SpySource {
    products: Vec<Product>,
    latency: Duration,
    failing_ids: HashSet<Uuid>,
    non_retriable: bool,
    fail_products: AtomicBool,
    transient_failures: AtomicUsize,
    product_filters: Mutex<Vec<ProductFilter>>,
    variant_calls: Mutex<Vec<(Vec<Uuid>, Instant)>>,
    sku_calls: Mutex<Vec<String>>,
    sku_failure: Mutex<Option<SkuFailure>>,
}

impl SpySource {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            latency: Duration::ZERO,
            failing_ids: HashSet::new(),
            non_retriable: false,
            fail_products: AtomicBool::new(false),
            transient_failures: AtomicUsize::new(0),
            product_filters: Mutex::new(Vec::new()),
            variant_calls: Mutex::new(Vec::new()),
            sku_calls: Mutex::new(Vec::new()),
            sku_failure: Mutex::new(None),
        }
    }

    /// Every query sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Variant queries that include any of `ids` fail.
    pub fn failing_for(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.failing_ids.extend(ids);
        self
    }

    /// Failures from `failing_for` are contract violations instead of
    /// transient outages.
    pub fn non_retriable(mut self) -> Self {
        self.non_retriable = true;
        self
    }

    /// The next `n` variant queries fail with a transient error.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_fail_products(&self, fail: bool) {
        self.fail_products.store(fail, Ordering::SeqCst);
    }

    pub fn set_sku_failure(&self, failure: Option<SkuFailure>) {
        *self.sku_failure.lock().unwrap() = failure;
    }

    pub fn product_query_count(&self) -> usize {
        self.product_filters.lock().unwrap().len()
    }

    pub fn product_filters(&self) -> Vec<ProductFilter> {
        self.product_filters.lock().unwrap().clone()
    }

    pub fn variant_calls(&self) -> Vec<Vec<Uuid>> {
        self.variant_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(ids, _)| ids.clone())
            .collect()
    }

    pub fn variant_call_sizes(&self) -> Vec<usize> {
        self.variant_calls().iter().map(Vec::len).collect()
    }

    pub fn variant_call_times(&self) -> Vec<Instant> {
        self.variant_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn sku_call_count(&self) -> usize {
        self.sku_calls.lock().unwrap().len()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn records_for<'a>(
        &'a self,
        product: &'a Product,
    ) -> impl Iterator<Item = VariantRecord> + 'a {
        let product_id = product.id;
        product.variants.iter().map(move |v| VariantRecord {
            id: v.id,
            product_id,
            name: v.name.clone(),
            sku: v.sku.clone(),
            quantity: v.quantity,
            cost_price: v.cost_price,
            selling_price: v.selling_price,
        })
    }
}

#[async_trait]
impl RecordSource for SpySource {
    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, SourceError> {
        self.product_filters.lock().unwrap().push(*filter);
        self.delay().await;
        if self.fail_products.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("spy: products offline".to_owned()));
        }
        Ok(self
            .products
            .iter()
            .filter(|p| filter.category.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| filter.supplier.is_none_or(|s| p.supplier_id == Some(s)))
            .cloned()
            .collect())
    }

    async fn query_variants_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<VariantRecord>, SourceError> {
        self.variant_calls
            .lock()
            .unwrap()
            .push((product_ids.to_vec(), Instant::now()));
        self.delay().await;

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SourceError::Unavailable("spy: transient".to_owned()));
        }
        if product_ids.iter().any(|id| self.failing_ids.contains(id)) {
            return Err(if self.non_retriable {
                SourceError::ContractViolation {
                    context: "spy".to_owned(),
                    reason: "scripted".to_owned(),
                }
            } else {
                SourceError::Unavailable("spy: scripted outage".to_owned())
            });
        }

        Ok(self
            .products
            .iter()
            .filter(|p| product_ids.contains(&p.id))
            .flat_map(|p| self.records_for(p))
            .collect())
    }

    async fn query_variant_by_sku(&self, sku: &str) -> Result<Option<VariantRecord>, SourceError> {
        self.sku_calls.lock().unwrap().push(sku.to_owned());
        self.delay().await;
        match *self.sku_failure.lock().unwrap() {
            Some(SkuFailure::Outage) => {
                return Err(SourceError::Unavailable("spy: sku outage".to_owned()));
            }
            Some(SkuFailure::NotFound) => {
                return Err(SourceError::NotFound(format!("spy: sku {sku}")));
            }
            Some(SkuFailure::Malformed) => {
                return Err(SourceError::ContractViolation {
                    context: "spy sku".to_owned(),
                    reason: "scripted".to_owned(),
                });
            }
            None => {}
        }
        Ok(self
            .products
            .iter()
            .flat_map(|p| self.records_for(p))
            .find(|r| r.sku == sku))
    }
}
