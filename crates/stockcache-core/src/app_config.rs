#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which record source backend the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// PostgREST-style HTTP API.
    Rest,
    /// Direct Postgres connection.
    Postgres,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Rest => write!(f, "rest"),
            SourceKind::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub source: SourceKind,
    /// Required when `source` is [`SourceKind::Rest`].
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
    /// Required when `source` is [`SourceKind::Postgres`].
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub metrics_ttl_ms: u64,
    pub price_ttl_secs: u64,
    pub price_batch_size: usize,
    pub price_max_attempts: u32,
    pub price_backoff_base_secs: u64,
    pub price_batch_concurrency: usize,
    pub price_inter_batch_delay_ms: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("source", &self.source)
            .field("rest_url", &self.rest_url)
            .field(
                "rest_api_key",
                &self.rest_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("metrics_ttl_ms", &self.metrics_ttl_ms)
            .field("price_ttl_secs", &self.price_ttl_secs)
            .field("price_batch_size", &self.price_batch_size)
            .field("price_max_attempts", &self.price_max_attempts)
            .field("price_backoff_base_secs", &self.price_backoff_base_secs)
            .field("price_batch_concurrency", &self.price_batch_concurrency)
            .field(
                "price_inter_batch_delay_ms",
                &self.price_inter_batch_delay_ms,
            )
            .finish()
    }
}
