//! Shared HTTP client for upstream sources.
//!
//! Each [`SourceClient`] owns a concurrency gate, a body ceiling, and the
//! retry policy for one upstream. A permit is held for the whole logical
//! call, back-off sleeps included, so a rate-limited source never sees more
//! than the configured number of requests in flight.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use topics_core::AppConfig;

use crate::error::SourceError;
use crate::rate_limit::retry_with_backoff;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Per-source client settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Short name used in logs and errors (`"feed"`, `"reddit"`, `"gdelt"`).
    pub name: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrency: usize,
    pub max_body_bytes: usize,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Pause held inside the gate after each call, spacing consecutive requests.
    pub request_spacing: Duration,
}

impl SourceSettings {
    fn common(config: &AppConfig, name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_owned(),
            base_url: base_url.to_owned(),
            timeout_secs: config.http_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_concurrency: 1,
            max_body_bytes: 0,
            max_retries: config.max_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
            request_spacing: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn feed(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.feed_concurrency,
            max_body_bytes: config.feed_max_body_bytes,
            ..Self::common(config, "feed", &config.feed_base_url)
        }
    }

    #[must_use]
    pub fn discussion(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.discussion_concurrency,
            max_body_bytes: config.discussion_max_body_bytes,
            request_spacing: Duration::from_millis(config.discussion_delay_ms),
            ..Self::common(config, "reddit", &config.discussion_base_url)
        }
    }

    #[must_use]
    pub fn tone(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.tone_concurrency,
            max_body_bytes: config.tone_max_body_bytes,
            ..Self::common(config, "gdelt", &config.tone_base_url)
        }
    }
}

/// Rate-limited JSON client for one upstream.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: Client,
    base_url: String,
    gate: Arc<Semaphore>,
    settings: SourceSettings,
}

impl SourceClient {
    /// Builds the client and its concurrency gate.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, [`SourceError::InvalidSettings`] if the
    /// concurrency bound is zero, or [`SourceError::InvalidUrl`] if the base
    /// URL does not parse.
    pub fn new(settings: SourceSettings) -> Result<Self, SourceError> {
        if settings.max_concurrency == 0 {
            return Err(SourceError::InvalidSettings {
                source_name: settings.name.clone(),
                reason: "concurrency must be at least 1".to_owned(),
            });
        }

        let base_url = settings.base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url).map_err(|e| SourceError::InvalidUrl {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url,
            gate: Arc::new(Semaphore::new(settings.max_concurrency)),
            settings,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.settings.max_concurrency
    }

    /// Joins `path` onto the base URL and appends `query` pairs, encoded.
    ///
    /// An empty `path` targets the base URL itself.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] if the joined URL does not parse.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, SourceError> {
        let path = path.trim_start_matches('/');
        let raw = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{path}", self.base_url)
        };

        let mut url = Url::parse(&raw).map_err(|e| SourceError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Fetches `url` through the gate and decodes the body as `T`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::GateClosed`] if the gate was closed.
    /// - [`SourceError::RateLimited`] once retries are exhausted.
    /// - [`SourceError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`SourceError::BodyTooLarge`] past the body ceiling.
    /// - [`SourceError::Http`] on network failure or timeout.
    /// - [`SourceError::Deserialize`] if the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SourceError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| SourceError::GateClosed)?;

        let body = retry_with_backoff(
            self.settings.max_retries,
            self.settings.retry_backoff_base_ms,
            || self.fetch_body(url),
        )
        .await;

        if !self.settings.request_spacing.is_zero() {
            tokio::time::sleep(self.settings.request_spacing).await;
        }

        serde_json::from_slice(&body?).map_err(|source| SourceError::Deserialize {
            context: format!("{} {url}", self.settings.name),
            source,
        })
    }

    async fn fetch_body(&self, url: &Url) -> Result<Vec<u8>, SourceError> {
        tracing::debug!(source = %self.settings.name, %url, "fetching");
        let mut response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(SourceError::RateLimited {
                source_name: self.settings.name.clone(),
                retry_after_secs,
            });
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.settings.max_body_bytes;
        let too_large = || SourceError::BodyTooLarge {
            url: url.to_string(),
            limit,
        };

        if response
            .content_length()
            .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > limit))
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
