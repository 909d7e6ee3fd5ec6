use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str = "topics/0.1 (trending-topics)";
const DEFAULT_FEED_BASE_URL: &str = "https://api.wikimedia.org/feed/v1/wikipedia";
const DEFAULT_DISCUSSION_BASE_URL: &str = "https://www.reddit.com";
const DEFAULT_TONE_BASE_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

const MAX_CONCURRENCY: usize = 64;
const MAX_EVENT_CAPACITY: usize = 1024;
/// One week.
const MAX_STALENESS_MINUTES: i64 = 10_080;

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
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required vars are missing or values are invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
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

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let parse_usize_in =
        |var: &str, default: &str, max: usize| -> Result<usize, ConfigError> {
            let value = parse_usize(var, default)?;
            if !(1..=max).contains(&value) {
                return Err(invalid(var, format!("{value} is outside 1..={max}")));
            }
            Ok(value)
        };

    let parse_concurrency =
        |var: &str, default: &str| parse_usize_in(var, default, MAX_CONCURRENCY);

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("TOPICS_ENV", "development"))?;
    let bind_addr = parse_addr("TOPICS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TOPICS_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("TOPICS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TOPICS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TOPICS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "TOPICS_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds TOPICS_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let http_timeout_secs = parse_u64("TOPICS_HTTP_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("TOPICS_USER_AGENT", DEFAULT_USER_AGENT);
    let max_retries = parse_u32("TOPICS_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("TOPICS_RETRY_BACKOFF_BASE_MS", "5000")?;

    let feed_enabled = parse_bool("TOPICS_FEED_ENABLED", "true")?;
    let feed_base_url = or_default("TOPICS_FEED_BASE_URL", DEFAULT_FEED_BASE_URL);
    let feed_lang = or_default("TOPICS_FEED_LANG", "en");
    let feed_concurrency = parse_concurrency("TOPICS_FEED_CONCURRENCY", "5")?;
    let feed_max_body_bytes = parse_usize("TOPICS_FEED_MAX_BODY_BYTES", "5242880")?;

    let discussion_enabled = parse_bool("TOPICS_DISCUSSION_ENABLED", "true")?;
    let discussion_base_url = or_default("TOPICS_DISCUSSION_BASE_URL", DEFAULT_DISCUSSION_BASE_URL);
    let discussion_concurrency = parse_concurrency("TOPICS_DISCUSSION_CONCURRENCY", "1")?;
    let discussion_max_body_bytes = parse_usize("TOPICS_DISCUSSION_MAX_BODY_BYTES", "16777216")?;
    let discussion_delay_ms = parse_u64("TOPICS_DISCUSSION_DELAY_MS", "2000")?;
    let max_discussion_items = parse_usize("TOPICS_MAX_DISCUSSION_ITEMS", "10")?;

    let tone_enabled = parse_bool("TOPICS_TONE_ENABLED", "true")?;
    let tone_base_url = or_default("TOPICS_TONE_BASE_URL", DEFAULT_TONE_BASE_URL);
    let tone_concurrency = parse_concurrency("TOPICS_TONE_CONCURRENCY", "5")?;
    let tone_max_body_bytes = parse_usize("TOPICS_TONE_MAX_BODY_BYTES", "16777216")?;
    let tone_timespan = or_default("TOPICS_TONE_TIMESPAN", "7d");

    let refresh_cron = or_default("TOPICS_REFRESH_CRON", "0 0 * * * *");
    let initial_delay_secs = parse_u64("TOPICS_INITIAL_DELAY_SECS", "10")?;
    let staleness_minutes = parse_i64("TOPICS_STALENESS_MINUTES", "59")?;
    if !(1..=MAX_STALENESS_MINUTES).contains(&staleness_minutes) {
        return Err(invalid(
            "TOPICS_STALENESS_MINUTES",
            format!("{staleness_minutes} is outside 1..={MAX_STALENESS_MINUTES}"),
        ));
    }
    let event_capacity = parse_usize_in("TOPICS_EVENT_CAPACITY", "16", MAX_EVENT_CAPACITY)?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        feed_enabled,
        feed_base_url,
        feed_lang,
        feed_concurrency,
        feed_max_body_bytes,
        discussion_enabled,
        discussion_base_url,
        discussion_concurrency,
        discussion_max_body_bytes,
        discussion_delay_ms,
        max_discussion_items,
        tone_enabled,
        tone_base_url,
        tone_concurrency,
        tone_max_body_bytes,
        tone_timespan,
        refresh_cron,
        initial_delay_secs,
        staleness_minutes,
        event_capacity,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TOPICS_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}
