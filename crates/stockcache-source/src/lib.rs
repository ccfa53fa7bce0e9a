//! Query contract for the remote store of product and variant records.
//!
//! The caches in `stockcache-cache` only ever talk to a [`RecordSource`]. This
//! crate ships the HTTP implementation ([`RestRecordSource`]); the Postgres one
//! lives in `stockcache-db`.

pub mod error;
pub mod rest;

use async_trait::async_trait;
use stockcache_core::{Product, ProductFilter, VariantRecord};
use uuid::Uuid;

pub use error::SourceError;
pub use rest::RestRecordSource;

/// Read-only access to product and variant records.
///
/// Every method may be slow and may fail. Implementations must report
/// transient failures so that [`SourceError::is_retriable`] returns `true`,
/// and absent resources as [`SourceError::NotFound`] or an empty result.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Products (with their variants in source order) matching `filter`.
    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, SourceError>;

    /// Variant rows belonging to any of `product_ids`. Products without
    /// variants contribute nothing.
    async fn query_variants_by_product_ids(
        &self,
        product_ids: &[Uuid],
    ) -> Result<Vec<VariantRecord>, SourceError>;

    /// The variant carrying `sku`, if one exists.
    async fn query_variant_by_sku(&self, sku: &str) -> Result<Option<VariantRecord>, SourceError>;
}
