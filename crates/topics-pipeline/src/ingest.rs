//! Featured-topics ingestion: fetch the most-read feed, resolve topics,
//! commit one snapshot batch, then announce it on the bus.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use topics_db::{NewViewSnapshot, SharedStore};
use topics_sources::{FeaturedArticle, FeedSource};

use crate::events::{RefreshBus, RefreshEvent};
use crate::staleness::check_staleness;
use crate::PipelineError;

/// Result of a gated refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The newest snapshot was still fresh; nothing was fetched.
    Fresh,
    /// Another cycle was already in flight; nothing was fetched.
    Busy,
    /// The feed was ingested. `None` when it had no usable entries.
    Ran(Option<RefreshEvent>),
}

impl CycleOutcome {
    #[must_use]
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran(_))
    }
}

pub struct FeaturedIngestor {
    store: SharedStore,
    feed: FeedSource,
    bus: RefreshBus,
    staleness: Duration,
    resolve_concurrency: usize,
    cycle: Mutex<()>,
}

impl FeaturedIngestor {
    #[must_use]
    pub fn new(
        store: SharedStore,
        feed: FeedSource,
        bus: RefreshBus,
        staleness: Duration,
        resolve_concurrency: usize,
    ) -> Self {
        Self {
            store,
            feed,
            bus,
            staleness,
            resolve_concurrency: resolve_concurrency.max(1),
            cycle: Mutex::new(()),
        }
    }

    /// Runs one ingest cycle unless the newest snapshot is still fresh.
    ///
    /// Cycles never overlap: a call made while another is still running
    /// returns [`CycleOutcome::Busy`] without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the feed fetch or the batch commit fails;
    /// nothing is written and no event is published in that case.
    pub async fn run_refresh_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome, PipelineError> {
        let Ok(_guard) = self.cycle.try_lock() else {
            tracing::info!("refresh cycle already in flight, skipping");
            return Ok(CycleOutcome::Busy);
        };

        if !check_staleness(self.store.as_ref(), now, self.staleness).await {
            tracing::info!(
                staleness_minutes = self.staleness.num_minutes(),
                "view history is fresh, skipping refresh"
            );
            return Ok(CycleOutcome::Fresh);
        }
        Ok(CycleOutcome::Ran(self.ingest(now.date_naive()).await?))
    }

    /// Ingests the feed for `date` regardless of staleness.
    ///
    /// Returns the published event, or `None` when the feed had no entries.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the feed fetch or the batch commit fails.
    pub async fn ingest(&self, date: NaiveDate) -> Result<Option<RefreshEvent>, PipelineError> {
        let articles = self.feed.fetch_most_read(date).await.inspect_err(|e| {
            tracing::error!(%date, error = %e, "featured feed fetch failed, aborting refresh");
        })?;

        if articles.is_empty() {
            tracing::info!(%date, "featured feed has no most-read entries, nothing to record");
            return Ok(None);
        }

        let resolved = self.resolve_all(articles).await;
        if resolved.is_empty() {
            tracing::warn!(%date, "no feed entry could be resolved to a topic");
            return Ok(None);
        }

        let (titles, snapshots): (Vec<String>, Vec<NewViewSnapshot>) = resolved.into_iter().unzip();
        let rows = self
            .store
            .insert_view_snapshots(&snapshots)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "snapshot batch commit failed, aborting refresh");
            })?;

        let created_at = rows.first().map_or_else(Utc::now, |r| r.created_at);
        let event = RefreshEvent {
            created_at,
            topic_titles: titles,
        };
        tracing::info!(%date, topics = rows.len(), "refresh batch committed");
        self.bus.publish(event.clone());
        Ok(Some(event))
    }

    /// Resolves every article to a topic, keeping feed order and dropping
    /// entries whose resolution failed.
    async fn resolve_all(&self, articles: Vec<FeaturedArticle>) -> Vec<(String, NewViewSnapshot)> {
        stream::iter(articles)
            .map(|article| async move {
                let resolved = self
                    .store
                    .resolve_topic(&article.title, article.url.as_deref())
                    .await;
                match resolved {
                    Ok(topic) => Some((
                        article.title,
                        NewViewSnapshot {
                            topic_id: topic.id,
                            views: i64::try_from(article.views).unwrap_or(i64::MAX),
                            trend: topics_core::trend(&article.view_history),
                        },
                    )),
                    Err(e) => {
                        tracing::warn!(topic = %article.title, error = %e, "topic resolution failed, dropping entry");
                        None
                    }
                }
            })
            .buffered(self.resolve_concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await
    }
}
