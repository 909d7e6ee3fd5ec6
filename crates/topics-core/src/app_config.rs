use std::net::SocketAddr;

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

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,

    pub feed_enabled: bool,
    pub feed_base_url: String,
    pub feed_lang: String,
    pub feed_concurrency: usize,
    pub feed_max_body_bytes: usize,

    pub discussion_enabled: bool,
    pub discussion_base_url: String,
    pub discussion_concurrency: usize,
    pub discussion_max_body_bytes: usize,
    pub discussion_delay_ms: u64,
    pub max_discussion_items: usize,

    pub tone_enabled: bool,
    pub tone_base_url: String,
    pub tone_concurrency: usize,
    pub tone_max_body_bytes: usize,
    pub tone_timespan: String,

    /// Six-field cron expression (seconds first) for the refresh job.
    pub refresh_cron: String,
    pub initial_delay_secs: u64,
    pub staleness_minutes: i64,
    pub event_capacity: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("feed_enabled", &self.feed_enabled)
            .field("feed_base_url", &self.feed_base_url)
            .field("feed_lang", &self.feed_lang)
            .field("feed_concurrency", &self.feed_concurrency)
            .field("feed_max_body_bytes", &self.feed_max_body_bytes)
            .field("discussion_enabled", &self.discussion_enabled)
            .field("discussion_base_url", &self.discussion_base_url)
            .field("discussion_concurrency", &self.discussion_concurrency)
            .field("discussion_max_body_bytes", &self.discussion_max_body_bytes)
            .field("discussion_delay_ms", &self.discussion_delay_ms)
            .field("max_discussion_items", &self.max_discussion_items)
            .field("tone_enabled", &self.tone_enabled)
            .field("tone_base_url", &self.tone_base_url)
            .field("tone_concurrency", &self.tone_concurrency)
            .field("tone_max_body_bytes", &self.tone_max_body_bytes)
            .field("tone_timespan", &self.tone_timespan)
            .field("refresh_cron", &self.refresh_cron)
            .field("initial_delay_secs", &self.initial_delay_secs)
            .field("staleness_minutes", &self.staleness_minutes)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}
