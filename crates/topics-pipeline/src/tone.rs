//! Tone enrichment: stores a fresh tone histogram for each refreshed topic.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use topics_db::{SharedStore, TopicRow};
use topics_sources::ToneSource;

use crate::discussion::lookup_topics;
use crate::events::{consume, RefreshEvent};
use crate::EnrichmentSummary;

pub struct ToneEnricher {
    store: SharedStore,
    source: ToneSource,
}

impl ToneEnricher {
    #[must_use]
    pub fn new(store: SharedStore, source: ToneSource) -> Self {
        Self { store, source }
    }

    /// Fetches and upserts a tone chart for every topic in `event`.
    ///
    /// A failed fetch stores an empty histogram. Each chart is written on its
    /// own, so one failed write does not affect the rest.
    pub async fn handle(&self, event: &RefreshEvent) -> EnrichmentSummary {
        let today = Utc::now().date_naive();
        let topics = lookup_topics(&self.store, &event.topic_titles).await;
        let total = topics.len();

        let outcomes: Vec<(bool, bool)> = stream::iter(topics)
            .map(|topic| self.enrich_one(topic, today))
            .buffer_unordered(self.source.max_concurrency())
            .collect()
            .await;

        let summary = EnrichmentSummary {
            topics: total,
            written: outcomes.iter().filter(|(written, _)| *written).count(),
            failed: outcomes
                .iter()
                .filter(|(written, fetched)| !(*written && *fetched))
                .count(),
        };
        tracing::info!(
            topics = summary.topics,
            written = summary.written,
            failed = summary.failed,
            "tone charts refreshed"
        );
        summary
    }

    /// Returns `(written, fetched)` for one topic.
    async fn enrich_one(&self, topic: TopicRow, today: NaiveDate) -> (bool, bool) {
        let (chart, fetched) = match self.source.fetch_tone_chart(&topic.title, today).await {
            Ok(chart) => (chart, true),
            Err(e) => {
                tracing::warn!(topic = %topic.title, error = %e, "tone chart fetch failed, storing empty histogram");
                (self.source.empty_chart(today), false)
            }
        };

        match self.store.upsert_tone_chart(topic.id, &chart).await {
            Ok(()) => (true, fetched),
            Err(e) => {
                tracing::error!(topic = %topic.title, error = %e, "tone chart write failed");
                (false, fetched)
            }
        }
    }

    /// Subscribes to the bus and handles each event until it closes.
    pub fn spawn(self: Arc<Self>, rx: broadcast::Receiver<RefreshEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            consume("tone", rx, |event| {
                let this = Arc::clone(&self);
                async move {
                    this.handle(&event).await;
                }
            })
            .await;
        })
    }
}
