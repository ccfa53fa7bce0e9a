//! TTL cache of [`MetricsSnapshot`]s, one slot per [`Scope`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use stockcache_core::{compute_metrics, AppConfig, MetricsSnapshot, Scope};
use stockcache_source::RecordSource;
use tracing::{debug, info, warn};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::flight::InFlight;

const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone)]
pub struct MetricsCacheConfig {
    pub ttl: Duration,
}

impl Default for MetricsCacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl MetricsCacheConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ttl: Duration::from_millis(config.metrics_ttl_ms),
        }
    }
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Remote product queries actually issued.
    pub fetches: u64,
}

/// Write-back token: a computation may store its snapshot only if neither
/// counter moved while it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    epoch: u64,
    scope: u64,
}

#[derive(Default)]
struct MetricsState {
    entries: HashMap<Scope, CacheEntry<MetricsSnapshot>>,
    /// Bumped by invalidating every scope.
    epoch: u64,
    /// Bumped by invalidating one scope.
    scope_generations: HashMap<Scope, u64>,
}

impl MetricsState {
    fn generation(&self, scope: &Scope) -> Generation {
        Generation {
            epoch: self.epoch,
            scope: self.scope_generations.get(scope).copied().unwrap_or(0),
        }
    }

    fn valid_entry(&self, scope: &Scope, ttl: Duration) -> Option<MetricsSnapshot> {
        self.entries
            .get(scope)
            .filter(|entry| entry.is_valid(ttl))
            .map(|entry| entry.value.clone())
    }
}

struct MetricsInner {
    source: Arc<dyn RecordSource>,
    config: MetricsCacheConfig,
    state: RwLock<MetricsState>,
    flights: InFlight<Scope, Result<MetricsSnapshot, CacheError>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl MetricsInner {
    fn read_state(&self) -> RwLockReadGuard<'_, MetricsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MetricsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn compute(self: Arc<Self>, scope: Scope) -> Result<MetricsSnapshot, CacheError> {
        let generation = {
            let state = self.read_state();
            // A job for this scope may have stored its result and deregistered
            // between the caller's cache check and this job's registration.
            if let Some(snapshot) = state.valid_entry(&scope, self.config.ttl) {
                debug!(%scope, "metrics stored by a concurrent job");
                return Ok(snapshot);
            }
            state.generation(&scope)
        };
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let products = self
            .source
            .query_products(&scope.filter())
            .await
            .map_err(|err| CacheError::from_source(format!("metrics for {scope}"), err))?;
        let snapshot = compute_metrics(&products);

        let mut state = self.write_state();
        if state.generation(&scope) == generation {
            state
                .entries
                .insert(scope, CacheEntry::new(snapshot.clone()));
        } else {
            debug!(%scope, "metrics invalidated while computing, result not stored");
        }
        drop(state);

        info!(
            %scope,
            products = snapshot.total_products,
            total_stock = snapshot.total_stock,
            "metrics snapshot computed"
        );
        Ok(snapshot)
    }
}

/// Metrics cache over a [`RecordSource`].
///
/// Clones share one cache. Concurrent misses for the same scope wait on a
/// single remote fetch.
#[derive(Clone)]
pub struct MetricsCache {
    inner: Arc<MetricsInner>,
}

impl MetricsCache {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, config: MetricsCacheConfig) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                source,
                config,
                state: RwLock::new(MetricsState::default()),
                flights: InFlight::default(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    /// The snapshot for `scope`, recomputed when missing or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::RemoteUnavailable`] when products cannot be
    /// fetched, or [`CacheError::ContractViolation`] when they arrive
    /// malformed. Failures are never cached.
    pub async fn get(&self, scope: &Scope) -> Result<MetricsSnapshot, CacheError> {
        let cached = self
            .inner
            .read_state()
            .valid_entry(scope, self.inner.config.ttl);
        if let Some(snapshot) = cached {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!(%scope, "metrics cache hit");
            return Ok(snapshot);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!(%scope, "metrics cache miss");

        let inner = Arc::clone(&self.inner);
        let scope = *scope;
        self.inner
            .flights
            .run(scope, move || inner.compute(scope).boxed())
            .await
    }

    /// Like [`get`](Self::get), but degrades to an all-zero snapshot when the
    /// record source fails. The zero snapshot is not cached.
    pub async fn get_or_empty(&self, scope: &Scope) -> MetricsSnapshot {
        match self.get(scope).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%scope, error = %err, "metrics unavailable, serving empty snapshot");
                MetricsSnapshot::empty(Utc::now())
            }
        }
    }

    /// Drops the entry for `scope`, or every entry when `None`.
    ///
    /// Computations already running for the dropped scopes are detached:
    /// they still answer their callers but do not write back, and the next
    /// [`get`](Self::get) starts a fresh fetch.
    pub fn invalidate(&self, scope: Option<&Scope>) {
        let mut state = self.inner.write_state();
        match scope {
            Some(scope) => {
                let generation = state.scope_generations.entry(*scope).or_insert(0);
                *generation = generation.wrapping_add(1);
                state.entries.remove(scope);
                self.inner.flights.forget(scope);
                debug!(%scope, "metrics invalidated");
            }
            None => {
                state.epoch = state.epoch.wrapping_add(1);
                state.entries.clear();
                self.inner.flights.forget_all();
                debug!("all metrics invalidated");
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            fetches: self.inner.fetches.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MetricsCacheConfig {
        &self.inner.config
    }
}
