use std::sync::Arc;

use stockcache_source::SourceError;
use thiserror::Error;

/// Errors surfaced by the metrics and price caches.
///
/// `Clone` so that every caller awaiting a shared in-flight fetch receives the
/// same result. Source errors are therefore held behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The record source could not be reached, or kept failing after retries.
    #[error("record source unavailable while fetching {context}: {source}")]
    RemoteUnavailable {
        context: String,
        #[source]
        source: Arc<SourceError>,
    },

    /// Every attempt for one price batch failed. Logged and answered with
    /// individual fallback fetches; never returned from a public method.
    #[error("batch of {batch_size} product ids failed after {attempts} attempt(s): {source}")]
    BatchExhausted {
        batch_size: usize,
        attempts: u32,
        #[source]
        source: Arc<SourceError>,
    },

    /// The record source answered with data that breaks the query contract.
    #[error("record source contract violation in {context}: {reason}")]
    ContractViolation { context: String, reason: String },
}

impl CacheError {
    /// Classifies a source failure that ended a fetch for `context`.
    pub(crate) fn from_source(context: impl Into<String>, err: SourceError) -> Self {
        Self::from_shared_source(context, Arc::new(err))
    }

    /// Same as [`from_source`](Self::from_source) for an error already shared
    /// between fetch results.
    pub(crate) fn from_shared_source(context: impl Into<String>, err: Arc<SourceError>) -> Self {
        let context = context.into();
        if err.is_contract_violation() {
            CacheError::ContractViolation {
                context,
                reason: err.to_string(),
            }
        } else {
            CacheError::RemoteUnavailable {
                context,
                source: err,
            }
        }
    }

    /// Returns `true` for [`CacheError::RemoteUnavailable`].
    #[must_use]
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, CacheError::RemoteUnavailable { .. })
    }
}
