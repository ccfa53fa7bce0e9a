use crate::app_config::{AppConfig, Environment, SourceKind};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    // Zero would stall batching or skip the fetch entirely.
    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("STOCKCACHE_ENV", "development"));
    let log_level = or_default("STOCKCACHE_LOG_LEVEL", "info");

    let source_raw = or_default("STOCKCACHE_SOURCE", "rest");
    let source = parse_source_kind(&source_raw).ok_or_else(|| {
        invalid(
            "STOCKCACHE_SOURCE",
            format!("expected \"rest\" or \"postgres\", got \"{source_raw}\""),
        )
    })?;

    let rest_url = lookup("STOCKCACHE_REST_URL").ok();
    let rest_api_key = lookup("STOCKCACHE_REST_API_KEY").ok();
    let database_url = lookup("DATABASE_URL").ok();

    match source {
        SourceKind::Rest if rest_url.is_none() => {
            return Err(ConfigError::MissingEnvVar("STOCKCACHE_REST_URL".to_string()));
        }
        SourceKind::Postgres if database_url.is_none() => {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }
        _ => {}
    }

    let db_max_connections = parse_u32("STOCKCACHE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("STOCKCACHE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("STOCKCACHE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let request_timeout_secs = parse_u64("STOCKCACHE_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default(
        "STOCKCACHE_USER_AGENT",
        "stockcache/0.1 (inventory-valuation)",
    );

    let metrics_ttl_ms = parse_u64("STOCKCACHE_METRICS_TTL_MS", "30000")?;
    let price_ttl_secs = parse_u64("STOCKCACHE_PRICE_TTL_SECS", "300")?;
    let price_batch_size = parse_positive_usize("STOCKCACHE_PRICE_BATCH_SIZE", "5")?;
    let price_max_attempts = parse_u32("STOCKCACHE_PRICE_MAX_ATTEMPTS", "3")?;
    if price_max_attempts == 0 {
        return Err(invalid(
            "STOCKCACHE_PRICE_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let price_backoff_base_secs = parse_u64("STOCKCACHE_PRICE_BACKOFF_BASE_SECS", "1")?;
    let price_batch_concurrency =
        parse_positive_usize("STOCKCACHE_PRICE_BATCH_CONCURRENCY", "1")?;
    let price_inter_batch_delay_ms = parse_u64("STOCKCACHE_PRICE_INTER_BATCH_DELAY_MS", "0")?;

    Ok(AppConfig {
        env,
        log_level,
        source,
        rest_url,
        rest_api_key,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        user_agent,
        metrics_ttl_ms,
        price_ttl_secs,
        price_batch_size,
        price_max_attempts,
        price_backoff_base_secs,
        price_batch_concurrency,
        price_inter_batch_delay_ms,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_source_kind(s: &str) -> Option<SourceKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "rest" => Some(SourceKind::Rest),
        "postgres" | "postgresql" => Some(SourceKind::Postgres),
        _ => None,
    }
}
