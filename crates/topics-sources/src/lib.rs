//! HTTP clients for the upstream sources: the featured feed, discussion
//! search, and the news tone chart.

pub mod client;
pub mod discussion;
pub mod error;
pub mod feed;
pub(crate) mod rate_limit;
pub mod tone;

pub use client::{SourceClient, SourceSettings};
pub use discussion::{DiscussionPost, DiscussionSource};
pub use error::SourceError;
pub use feed::{featured_path, FeaturedArticle, FeedSource};
pub use tone::ToneSource;

/// The three sources built from application config.
pub struct Sources {
    pub feed: FeedSource,
    pub discussion: DiscussionSource,
    pub tone: ToneSource,
}

impl Sources {
    /// # Errors
    ///
    /// Returns [`SourceError`] if any client cannot be built.
    pub fn from_config(config: &topics_core::AppConfig) -> Result<Self, SourceError> {
        Ok(Self {
            feed: FeedSource::new(
                SourceClient::new(SourceSettings::feed(config))?,
                &config.feed_lang,
            ),
            discussion: DiscussionSource::new(
                SourceClient::new(SourceSettings::discussion(config))?,
                config.max_discussion_items,
            ),
            tone: ToneSource::new(
                SourceClient::new(SourceSettings::tone(config))?,
                &config.tone_timespan,
            ),
        })
    }
}
