//! In-memory [`TopicStore`] for tests that should not need Postgres.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use topics_core::ToneChartDocument;

use crate::{
    DbError, DiscussionItemRow, NewDiscussionItem, NewViewSnapshot, RankedTopicRow, TopicRow,
    TopicStore, ViewSnapshotRow,
};

#[derive(Debug, Default)]
struct State {
    topics: Vec<TopicRow>,
    snapshots: Vec<ViewSnapshotRow>,
    discussions: Vec<DiscussionItemRow>,
    tone_charts: HashMap<i64, ToneChartDocument>,
    next_id: i64,
    last_batch_at: Option<DateTime<Utc>>,
    fail_writes: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_topic(&self, topic_id: i64) -> bool {
        self.topics.iter().any(|t| t.id == topic_id)
    }

    /// One timestamp per batch, strictly after the previous batch.
    fn batch_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_batch_at {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_batch_at = Some(now);
        now
    }

    fn ranked(&self, rows: impl Iterator<Item = ViewSnapshotRow>, limit: i64) -> Vec<RankedTopicRow> {
        let mut ranked: Vec<(i64, RankedTopicRow)> = rows
            .filter_map(|s| {
                let topic = self.topics.iter().find(|t| t.id == s.topic_id)?;
                Some((
                    s.id,
                    RankedTopicRow {
                        topic_id: s.topic_id,
                        title: topic.title.clone(),
                        url: topic.url.clone(),
                        views: s.views,
                        trend: s.trend,
                        captured_at: s.created_at,
                    },
                ))
            })
            .collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| b.views.cmp(&a.views).then(a_id.cmp(b_id)));
        ranked
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(|(_, row)| row)
            .collect()
    }
}

/// A [`TopicStore`] backed by a mutex-guarded vector set.
///
/// Batch writes validate every row before mutating, so a rejected batch
/// leaves no partial state behind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent batch, delete, or chart write fail with
    /// [`DbError::NotFound`]. Topic resolution is unaffected.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of snapshot rows currently stored.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots.len()
    }

    fn check_writable(state: &State) -> Result<(), DbError> {
        if state.fail_writes {
            Err(DbError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TopicStore for MemoryStore {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find_topic_by_title(&self, title: &str) -> Result<Option<TopicRow>, DbError> {
        Ok(self.lock().topics.iter().find(|t| t.title == title).cloned())
    }

    async fn resolve_topic(&self, title: &str, url: Option<&str>) -> Result<TopicRow, DbError> {
        let mut state = self.lock();
        let now = Utc::now();

        if let Some(existing) = state.topics.iter_mut().find(|t| t.title == title) {
            if existing.url.is_none() {
                existing.url = url.map(str::to_owned);
            }
            existing.modified_at = now;
            return Ok(existing.clone());
        }

        let row = TopicRow {
            id: state.next_id(),
            title: title.to_owned(),
            url: url.map(str::to_owned),
            created_at: now,
            modified_at: now,
        };
        state.topics.push(row.clone());
        Ok(row)
    }

    async fn insert_view_snapshots(
        &self,
        snapshots: &[NewViewSnapshot],
    ) -> Result<Vec<ViewSnapshotRow>, DbError> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        if snapshots.iter().any(|s| !state.has_topic(s.topic_id) || s.views < 0) {
            return Err(DbError::NotFound);
        }

        let at = state.batch_timestamp();
        let mut rows = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let row = ViewSnapshotRow {
                id: state.next_id(),
                topic_id: snapshot.topic_id,
                views: snapshot.views,
                trend: snapshot.trend,
                created_at: at,
                modified_at: at,
            };
            state.snapshots.push(row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    async fn latest_snapshot_modified_at(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        Ok(self.lock().snapshots.iter().map(|s| s.modified_at).max())
    }

    async fn list_latest_ranked_topics(&self, limit: i64) -> Result<Vec<RankedTopicRow>, DbError> {
        let state = self.lock();
        let Some(latest) = state.snapshots.iter().map(|s| s.created_at).max() else {
            return Ok(Vec::new());
        };
        let rows = state
            .snapshots
            .iter()
            .filter(|s| s.created_at == latest)
            .cloned()
            .collect::<Vec<_>>();
        Ok(state.ranked(rows.into_iter(), limit))
    }

    async fn list_ranked_topics_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RankedTopicRow>, DbError> {
        let state = self.lock();
        let rows = state
            .snapshots
            .iter()
            .filter(|s| s.created_at >= start && s.created_at < end)
            .cloned()
            .collect::<Vec<_>>();
        Ok(state.ranked(rows.into_iter(), limit))
    }

    async fn delete_all_view_snapshots(&self) -> Result<u64, DbError> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        let removed = state.snapshots.len() as u64;
        state.snapshots.clear();
        Ok(removed)
    }

    async fn replace_discussion_items(
        &self,
        batch: &[(i64, Vec<NewDiscussionItem>)],
    ) -> Result<usize, DbError> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        if batch.iter().any(|(topic_id, _)| !state.has_topic(*topic_id)) {
            return Err(DbError::NotFound);
        }

        let now = Utc::now();
        let mut inserted = 0usize;
        for (topic_id, items) in batch {
            state.discussions.retain(|d| d.topic_id != *topic_id);
            for item in items {
                let row = DiscussionItemRow {
                    id: state.next_id(),
                    topic_id: *topic_id,
                    subreddit: item.subreddit.clone(),
                    title: item.title.clone(),
                    body: item.body.clone(),
                    score: item.score,
                    url: item.url.clone(),
                    posted_at: item.posted_at,
                    created_at: now,
                };
                state.discussions.push(row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn list_discussion_items(&self, topic_id: i64) -> Result<Vec<DiscussionItemRow>, DbError> {
        let mut rows: Vec<DiscussionItemRow> = self
            .lock()
            .discussions
            .iter()
            .filter(|d| d.topic_id == topic_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn upsert_tone_chart(
        &self,
        topic_id: i64,
        chart: &ToneChartDocument,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        Self::check_writable(&state)?;
        if !state.has_topic(topic_id) {
            return Err(DbError::NotFound);
        }
        state.tone_charts.insert(topic_id, chart.clone());
        Ok(())
    }

    async fn get_tone_chart(&self, topic_id: i64) -> Result<Option<ToneChartDocument>, DbError> {
        Ok(self.lock().tone_charts.get(&topic_id).cloned())
    }
}
