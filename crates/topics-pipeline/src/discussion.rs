//! Discussion enrichment: replaces each refreshed topic's recent posts.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use topics_db::{NewDiscussionItem, SharedStore, TopicRow};
use topics_sources::{DiscussionPost, DiscussionSource};

use crate::events::{consume, RefreshEvent};
use crate::EnrichmentSummary;

pub struct DiscussionEnricher {
    store: SharedStore,
    source: DiscussionSource,
}

impl DiscussionEnricher {
    #[must_use]
    pub fn new(store: SharedStore, source: DiscussionSource) -> Self {
        Self { store, source }
    }

    /// Fetches posts for every topic in `event` and writes the results as
    /// one batch, replacing each fetched topic's stored items.
    ///
    /// A successful fetch with no posts clears that topic's items. A failed
    /// fetch counts against that topic only and leaves its stored items
    /// untouched. When no fetch succeeded the write is skipped. A failed
    /// batch write is logged and reported in the summary.
    pub async fn handle(&self, event: &RefreshEvent) -> EnrichmentSummary {
        let topics = lookup_topics(&self.store, &event.topic_titles).await;
        let mut summary = EnrichmentSummary {
            topics: topics.len(),
            ..EnrichmentSummary::default()
        };

        let fetched: Vec<(i64, Option<Vec<DiscussionPost>>)> = stream::iter(topics)
            .map(|topic| async move {
                match self.source.fetch_latest(&topic.title).await {
                    Ok(posts) => (topic.id, Some(posts)),
                    Err(e) => {
                        tracing::warn!(topic = %topic.title, error = %e, "discussion fetch failed");
                        (topic.id, None)
                    }
                }
            })
            .buffer_unordered(self.source.max_concurrency())
            .collect()
            .await;

        let mut batch = Vec::new();
        for (topic_id, posts) in fetched {
            match posts {
                None => summary.failed += 1,
                Some(posts) => batch.push((topic_id, posts.into_iter().map(into_item).collect())),
            }
        }

        if batch.is_empty() {
            tracing::info!(topics = summary.topics, "no discussion fetch succeeded, nothing to store");
            return summary;
        }

        match self.store.replace_discussion_items(&batch).await {
            Ok(items) => {
                summary.written = batch.len();
                tracing::info!(topics = batch.len(), items, "discussion items stored");
            }
            Err(e) => {
                summary.failed += batch.len();
                tracing::error!(topics = batch.len(), error = %e, "discussion batch write failed");
            }
        }
        summary
    }

    /// Subscribes to the bus and handles each event until it closes.
    pub fn spawn(self: Arc<Self>, rx: broadcast::Receiver<RefreshEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            consume("discussions", rx, |event| {
                let this = Arc::clone(&self);
                async move {
                    this.handle(&event).await;
                }
            })
            .await;
        })
    }
}

fn into_item(post: DiscussionPost) -> NewDiscussionItem {
    NewDiscussionItem {
        subreddit: post.subreddit,
        title: post.title,
        body: post.body,
        score: post.score,
        url: post.url,
        posted_at: post.posted_at,
    }
}

/// Looks up each title, skipping unknown titles and failed lookups.
pub(crate) async fn lookup_topics(store: &SharedStore, titles: &[String]) -> Vec<TopicRow> {
    let mut topics = Vec::with_capacity(titles.len());
    for title in titles {
        match store.find_topic_by_title(title).await {
            Ok(Some(topic)) => topics.push(topic),
            Ok(None) => tracing::warn!(topic = %title, "refreshed topic not found, skipping"),
            Err(e) => tracing::warn!(topic = %title, error = %e, "topic lookup failed, skipping"),
        }
    }
    topics
}
