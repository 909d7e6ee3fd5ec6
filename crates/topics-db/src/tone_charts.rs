//! Database operations for the `tone_charts` table.

use serde_json::Value;
use sqlx::PgPool;
use topics_core::ToneChartDocument;

use crate::DbError;

/// Stores `chart` as the topic's only tone chart, overwriting any previous one.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the document cannot be encoded, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_tone_chart(
    pool: &PgPool,
    topic_id: i64,
    chart: &ToneChartDocument,
) -> Result<(), DbError> {
    let value = serde_json::to_value(chart)
        .map_err(|source| DbError::Serialization { topic_id, source })?;

    sqlx::query(
        "INSERT INTO tone_charts (topic_id, chart) \
         VALUES ($1, $2) \
         ON CONFLICT (topic_id) DO UPDATE SET \
             chart       = EXCLUDED.chart, \
             modified_at = NOW()",
    )
    .bind(topic_id)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the topic's tone chart, or `None` if none has been stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::Serialization`] if the stored JSON no longer matches the
/// document shape.
pub async fn get_tone_chart(
    pool: &PgPool,
    topic_id: i64,
) -> Result<Option<ToneChartDocument>, DbError> {
    let value = sqlx::query_scalar::<_, Value>("SELECT chart FROM tone_charts WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_optional(pool)
        .await?;

    value
        .map(|v| serde_json::from_value(v).map_err(|source| DbError::Serialization { topic_id, source }))
        .transpose()
}
