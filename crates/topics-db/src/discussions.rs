//! Database operations for the `discussion_items` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A discussion post to attach to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscussionItem {
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub url: String,
    pub posted_at: DateTime<Utc>,
}

/// A row from the `discussion_items` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DiscussionItemRow {
    pub id: i64,
    pub topic_id: i64,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Replaces the discussion items of every topic in `batch` in one transaction.
///
/// For each `(topic_id, items)` pair the topic's previous items are deleted
/// before the new ones are inserted. Topics not named in `batch` are left
/// untouched. Returns the number of items inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails; nothing is
/// written in that case.
pub async fn replace_discussion_items(
    pool: &PgPool,
    batch: &[(i64, Vec<NewDiscussionItem>)],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (topic_id, items) in batch {
        sqlx::query("DELETE FROM discussion_items WHERE topic_id = $1")
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO discussion_items \
                     (topic_id, subreddit, title, body, score, url, posted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(topic_id)
            .bind(&item.subreddit)
            .bind(&item.title)
            .bind(&item.body)
            .bind(item.score)
            .bind(&item.url)
            .bind(item.posted_at)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Lists a topic's discussion items, most recently posted first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_discussion_items(
    pool: &PgPool,
    topic_id: i64,
) -> Result<Vec<DiscussionItemRow>, DbError> {
    let rows = sqlx::query_as::<_, DiscussionItemRow>(
        "SELECT id, topic_id, subreddit, title, body, score, url, posted_at, created_at \
         FROM discussion_items \
         WHERE topic_id = $1 \
         ORDER BY posted_at DESC, id DESC",
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
