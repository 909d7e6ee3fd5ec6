//! Discussion search: recent posts mentioning a topic title.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::SourceClient;
use crate::error::SourceError;

const POST_URL_PREFIX: &str = "https://www.reddit.com";

/// One post from a search listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionPost {
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub url: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: Option<ListingData>,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    #[serde(default)]
    subreddit_name_prefixed: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    created_utc: f64,
}

pub struct DiscussionSource {
    client: SourceClient,
    max_items: usize,
}

impl DiscussionSource {
    #[must_use]
    pub fn new(client: SourceClient, max_items: usize) -> Self {
        Self { client, max_items }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.client.max_concurrency()
    }

    /// Searches the last day of posts for `title`, keeping at most the
    /// configured number of items in listing order.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the fetch or decode.
    pub async fn fetch_latest(&self, title: &str) -> Result<Vec<DiscussionPost>, SourceError> {
        let url = self
            .client
            .endpoint("search.json", &[("q", title), ("type", "posts"), ("t", "day")])?;
        let listing: Listing = self.client.get_json(&url).await?;
        Ok(into_posts(listing, self.max_items))
    }
}

fn into_posts(listing: Listing, max_items: usize) -> Vec<DiscussionPost> {
    listing
        .data
        .map(|d| d.children)
        .unwrap_or_default()
        .into_iter()
        .take(max_items)
        .map(|child| {
            let post = child.data;
            DiscussionPost {
                subreddit: post.subreddit_name_prefixed,
                title: post.title,
                body: post.selftext,
                score: post.ups,
                url: format!("{POST_URL_PREFIX}{}", post.permalink),
                posted_at: posted_at(post.created_utc),
            }
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn posted_at(created_utc: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_utc.trunc() as i64, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
