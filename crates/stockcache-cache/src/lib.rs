//! Caching layer in front of a [`RecordSource`](stockcache_source::RecordSource).
//!
//! - [`MetricsCache`] keeps one [`MetricsSnapshot`](stockcache_core::MetricsSnapshot)
//!   per scope for a fixed TTL.
//! - [`PriceLookupService`] keeps per-product price lists under a single shared
//!   watermark and fetches misses in retried batches.
//!
//! Both are explicitly constructed values, cloned to share. State lives for
//! the process and is never persisted.

pub mod entry;
pub mod error;
mod flight;
pub mod metrics_cache;
pub mod prices;
mod retry;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use metrics_cache::{CacheStats, MetricsCache, MetricsCacheConfig};
pub use prices::{PriceFetchReport, PriceLookupConfig, PriceLookupService};
