//! Database operations for the `topics` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `topics` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TopicRow {
    pub id: i64,
    pub title: String,
    /// Canonical page URL, recorded the first time the title is seen.
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Returns the topic with the given title, or `None` if it has never been seen.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_topic_by_title(pool: &PgPool, title: &str) -> Result<Option<TopicRow>, DbError> {
    let row = sqlx::query_as::<_, TopicRow>(
        "SELECT id, title, url, created_at, modified_at \
         FROM topics \
         WHERE title = $1",
    )
    .bind(title)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the topic for `title`, creating it if absent.
///
/// One `INSERT … ON CONFLICT (title) DO UPDATE` statement: competing
/// resolutions of the same title block on the unique index and all return the
/// single winning row. An existing topic keeps its `id`, `created_at`, and
/// first-seen `url`; only `modified_at` is bumped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn resolve_topic(
    pool: &PgPool,
    title: &str,
    url: Option<&str>,
) -> Result<TopicRow, DbError> {
    let row = sqlx::query_as::<_, TopicRow>(
        "INSERT INTO topics (title, url) \
         VALUES ($1, $2) \
         ON CONFLICT (title) DO UPDATE SET \
             url         = COALESCE(topics.url, EXCLUDED.url), \
             modified_at = NOW() \
         RETURNING id, title, url, created_at, modified_at",
    )
    .bind(title)
    .bind(url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
