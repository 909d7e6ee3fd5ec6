use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use topics_core::ToneChartDocument;
use topics_db::RankedTopicRow;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

const TOP_DEFAULT_LIMIT: i64 = 25;
const TRENDING_DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub(super) struct TopicItem {
    pub topic_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub views: i64,
    pub trend: f64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct DiscussionItem {
    pub id: i64,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    pub url: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    pub limit: Option<i64>,
}

impl From<RankedTopicRow> for TopicItem {
    fn from(row: RankedTopicRow) -> Self {
        Self {
            topic_id: row.topic_id,
            title: row.title,
            url: row.url,
            views: row.views,
            trend: row.trend,
            captured_at: row.captured_at,
        }
    }
}

pub(super) async fn list_top_topics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TopicItem>>>, ApiError> {
    let rows = state
        .store
        .list_latest_ranked_topics(normalize_limit(query.limit, TOP_DEFAULT_LIMIT))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(TopicItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_trending_on_day(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((year, month, day)): Path<(i32, u32, u32)>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TopicItem>>>, ApiError> {
    let Some((start, end)) = day_bounds(year, month, day) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("{year:04}-{month:02}-{day:02} is not a valid date"),
        ));
    };

    let rows = state
        .store
        .list_ranked_topics_between(start, end, normalize_limit(query.limit, TRENDING_DEFAULT_LIMIT))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(TopicItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_topic_discussions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(topic_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<DiscussionItem>>>, ApiError> {
    let rows = state
        .store
        .list_discussion_items(topic_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| DiscussionItem {
            id: row.id,
            subreddit: row.subreddit,
            title: row.title,
            body: row.body,
            score: row.score,
            url: row.url,
            posted_at: row.posted_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_topic_tone_chart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(topic_id): Path<i64>,
) -> Result<Json<ApiResponse<ToneChartDocument>>, ApiError> {
    let chart = state
        .store
        .get_tone_chart(topic_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .unwrap_or_default();

    Ok(Json(ApiResponse {
        data: chart,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `[midnight, next midnight)` in UTC, or `None` for an impossible date.
fn day_bounds(year: i32, month: u32, day: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let next = date.checked_add_days(Days::new(1))?;
    Some((
        date.and_hms_opt(0, 0, 0)?.and_utc(),
        next.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}
