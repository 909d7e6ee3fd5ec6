//! Database operations for the append-only `view_history_snapshots` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A snapshot to be inserted as part of one refresh batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NewViewSnapshot {
    pub topic_id: i64,
    pub views: i64,
    pub trend: f64,
}

/// A row from the `view_history_snapshots` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ViewSnapshotRow {
    pub id: i64,
    pub topic_id: i64,
    pub views: i64,
    pub trend: f64,
    /// Identical for every row of one batch (the transaction timestamp).
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A snapshot joined with its topic, as served by the ranked listings.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RankedTopicRow {
    pub topic_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub views: i64,
    pub trend: f64,
    pub captured_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts every snapshot of a refresh batch inside one transaction.
///
/// Either all rows become visible together or none do; a snapshot that
/// references an unknown topic fails the foreign key and rolls back the batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert or the commit fails.
pub async fn insert_view_snapshots(
    pool: &PgPool,
    snapshots: &[NewViewSnapshot],
) -> Result<Vec<ViewSnapshotRow>, DbError> {
    let mut tx = pool.begin().await?;
    let mut rows = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        let row = sqlx::query_as::<_, ViewSnapshotRow>(
            "INSERT INTO view_history_snapshots (topic_id, views, trend) \
             VALUES ($1, $2, $3) \
             RETURNING id, topic_id, views, trend, created_at, modified_at",
        )
        .bind(snapshot.topic_id)
        .bind(snapshot.views)
        .bind(snapshot.trend)
        .fetch_one(&mut *tx)
        .await?;
        rows.push(row);
    }

    tx.commit().await?;
    Ok(rows)
}

/// Deletes the entire view history. Topics are left in place.
///
/// Returns the number of snapshots removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_all_view_snapshots(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM view_history_snapshots")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns the most recent `modified_at` across all snapshots, or `None` when
/// no refresh has ever been committed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_snapshot_modified_at(pool: &PgPool) -> Result<Option<DateTime<Utc>>, DbError> {
    let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(modified_at) FROM view_history_snapshots",
    )
    .fetch_one(pool)
    .await?;

    Ok(latest)
}

/// Lists the newest batch ordered by `views DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_latest_ranked_topics(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<RankedTopicRow>, DbError> {
    let rows = sqlx::query_as::<_, RankedTopicRow>(
        "SELECT s.topic_id, t.title, t.url, s.views, s.trend, s.created_at AS captured_at \
         FROM view_history_snapshots s \
         JOIN topics t ON t.id = s.topic_id \
         WHERE s.created_at = (SELECT MAX(created_at) FROM view_history_snapshots) \
         ORDER BY s.views DESC, s.id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists snapshots created in `[start, end)` ordered by `views DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ranked_topics_between(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<RankedTopicRow>, DbError> {
    let rows = sqlx::query_as::<_, RankedTopicRow>(
        "SELECT s.topic_id, t.title, t.url, s.views, s.trend, s.created_at AS captured_at \
         FROM view_history_snapshots s \
         JOIN topics t ON t.id = s.topic_id \
         WHERE s.created_at >= $1 AND s.created_at < $2 \
         ORDER BY s.views DESC, s.id ASC \
         LIMIT $3",
    )
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
