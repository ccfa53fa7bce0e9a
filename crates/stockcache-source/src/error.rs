use thiserror::Error;

/// Errors returned by a [`RecordSource`](crate::RecordSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backing store could not be reached or refused the query.
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The source answered with data that breaks the query contract.
    #[error("record source contract violation in {context}: {reason}")]
    ContractViolation { context: String, reason: String },
}

impl SourceError {
    /// Returns `true` for transient failures that are worth retrying.
    ///
    /// **Retriable:** timeouts and connection failures, HTTP 408/429/5xx,
    /// [`SourceError::Unavailable`].
    ///
    /// **Not retriable:** [`SourceError::NotFound`], other 4xx statuses,
    /// malformed payloads and contract violations.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            SourceError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            SourceError::Unavailable(_) => true,
            SourceError::UnexpectedStatus { status, .. } => is_retriable_status(*status),
            SourceError::NotFound(_)
            | SourceError::InvalidBaseUrl { .. }
            | SourceError::Deserialize { .. }
            | SourceError::ContractViolation { .. } => false,
        }
    }

    /// Returns `true` when the source reported the resource as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    /// Returns `true` when the payload did not match the query contract.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SourceError::Deserialize { .. } | SourceError::ContractViolation { .. }
        )
    }
}

pub(crate) fn is_retriable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}
