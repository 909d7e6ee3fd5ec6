//! The persistence seam used by the pipeline and the read API.
//!
//! [`PgStore`] delegates to the query functions in this crate. With the
//! `test-support` feature, [`crate::memory::MemoryStore`] provides the same
//! contract in memory.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use topics_core::ToneChartDocument;

use crate::{
    discussions, tone_charts, topics, view_history, DbError, DiscussionItemRow, NewDiscussionItem,
    NewViewSnapshot, RankedTopicRow, TopicRow, ViewSnapshotRow,
};

/// Reference-counted store handle shared between tasks.
pub type SharedStore = Arc<dyn TopicStore>;

/// Every store operation the pipeline and read API need.
#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Verifies the backing store is reachable.
    async fn ping(&self) -> Result<(), DbError>;

    async fn find_topic_by_title(&self, title: &str) -> Result<Option<TopicRow>, DbError>;

    /// Find-or-create by title. Concurrent calls for one title return one row.
    async fn resolve_topic(&self, title: &str, url: Option<&str>) -> Result<TopicRow, DbError>;

    /// Inserts one refresh batch atomically.
    async fn insert_view_snapshots(
        &self,
        snapshots: &[NewViewSnapshot],
    ) -> Result<Vec<ViewSnapshotRow>, DbError>;

    async fn latest_snapshot_modified_at(&self) -> Result<Option<DateTime<Utc>>, DbError>;

    async fn list_latest_ranked_topics(&self, limit: i64) -> Result<Vec<RankedTopicRow>, DbError>;

    async fn list_ranked_topics_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RankedTopicRow>, DbError>;

    async fn delete_all_view_snapshots(&self) -> Result<u64, DbError>;

    /// Replaces the items of every listed topic in one transaction.
    async fn replace_discussion_items(
        &self,
        batch: &[(i64, Vec<NewDiscussionItem>)],
    ) -> Result<usize, DbError>;

    async fn list_discussion_items(&self, topic_id: i64) -> Result<Vec<DiscussionItemRow>, DbError>;

    async fn upsert_tone_chart(&self, topic_id: i64, chart: &ToneChartDocument)
        -> Result<(), DbError>;

    async fn get_tone_chart(&self, topic_id: i64) -> Result<Option<ToneChartDocument>, DbError>;
}

/// Postgres-backed [`TopicStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TopicStore for PgStore {
    async fn ping(&self) -> Result<(), DbError> {
        crate::ping(&self.pool).await?;
        Ok(())
    }

    async fn find_topic_by_title(&self, title: &str) -> Result<Option<TopicRow>, DbError> {
        topics::find_topic_by_title(&self.pool, title).await
    }

    async fn resolve_topic(&self, title: &str, url: Option<&str>) -> Result<TopicRow, DbError> {
        topics::resolve_topic(&self.pool, title, url).await
    }

    async fn insert_view_snapshots(
        &self,
        snapshots: &[NewViewSnapshot],
    ) -> Result<Vec<ViewSnapshotRow>, DbError> {
        view_history::insert_view_snapshots(&self.pool, snapshots).await
    }

    async fn latest_snapshot_modified_at(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        view_history::latest_snapshot_modified_at(&self.pool).await
    }

    async fn list_latest_ranked_topics(&self, limit: i64) -> Result<Vec<RankedTopicRow>, DbError> {
        view_history::list_latest_ranked_topics(&self.pool, limit).await
    }

    async fn list_ranked_topics_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RankedTopicRow>, DbError> {
        view_history::list_ranked_topics_between(&self.pool, start, end, limit).await
    }

    async fn delete_all_view_snapshots(&self) -> Result<u64, DbError> {
        view_history::delete_all_view_snapshots(&self.pool).await
    }

    async fn replace_discussion_items(
        &self,
        batch: &[(i64, Vec<NewDiscussionItem>)],
    ) -> Result<usize, DbError> {
        discussions::replace_discussion_items(&self.pool, batch).await
    }

    async fn list_discussion_items(&self, topic_id: i64) -> Result<Vec<DiscussionItemRow>, DbError> {
        discussions::list_discussion_items(&self.pool, topic_id).await
    }

    async fn upsert_tone_chart(
        &self,
        topic_id: i64,
        chart: &ToneChartDocument,
    ) -> Result<(), DbError> {
        tone_charts::upsert_tone_chart(&self.pool, topic_id, chart).await
    }

    async fn get_tone_chart(&self, topic_id: i64) -> Result<Option<ToneChartDocument>, DbError> {
        tone_charts::get_tone_chart(&self.pool, topic_id).await
    }
}
