mod topics;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use topics_db::SharedStore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Applies `default` when absent and clamps to `1..=200`.
pub(super) fn normalize_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &topics_db::DbError) -> ApiError {
    tracing::error!(error = %error, "store query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/topics/top", get(topics::list_top_topics))
        .route(
            "/api/v1/topics/trending/{year}/{month}/{day}",
            get(topics::list_trending_on_day),
        )
        .route(
            "/api/v1/topics/{topic_id}/discussions",
            get(topics::list_topic_discussions),
        )
        .route(
            "/api/v1/topics/{topic_id}/tone-chart",
            get(topics::get_topic_tone_chart),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::TimeZone;
    use topics_core::{ToneBin, ToneChartDocument};
    use topics_db::memory::MemoryStore;
    use topics_db::{NewDiscussionItem, NewViewSnapshot, TopicStore};
    use tower::ServiceExt;

    use super::*;

    fn app(store: Arc<MemoryStore>) -> Router {
        build_app(AppState { store })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json parse"))
    }

    async fn seed_batch(store: &MemoryStore, entries: &[(&str, i64, f64)]) {
        let mut snapshots = Vec::new();
        for (title, views, trend) in entries {
            let topic = store.resolve_topic(title, None).await.expect("resolve");
            snapshots.push(NewViewSnapshot {
                topic_id: topic.id,
                views: *views,
                trend: *trend,
            });
        }
        store.insert_view_snapshots(&snapshots).await.expect("insert");
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None, 25), 25);
        assert_eq!(normalize_limit(Some(0), 25), 1);
        assert_eq!(normalize_limit(Some(1_000), 25), 200);
        assert_eq!(normalize_limit(Some(40), 25), 40);
    }

    #[test]
    fn api_error_bad_request_maps_to_400() {
        let response = ApiError::new("req-1", "bad_request", "invalid date").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_ok_and_echoes_request_id() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
            Some("req-abc")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["meta"]["request_id"], "req-abc");
    }

    #[tokio::test]
    async fn top_topics_lists_latest_batch_by_views() {
        let store = Arc::new(MemoryStore::new());
        seed_batch(&store, &[("Old", 9_999, 0.0)]).await;
        seed_batch(&store, &[("Small", 10, -1.0), ("Big", 500, 2.5)]).await;

        let (status, json) = get_json(app(store), "/api/v1/topics/top?limit=5").await;

        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["title"], "Big");
        assert_eq!(data[0]["views"], 500);
        assert_eq!(data[0]["trend"], 2.5);
        assert_eq!(data[1]["title"], "Small");
    }

    #[tokio::test]
    async fn trending_on_day_filters_by_creation_date() {
        let store = Arc::new(MemoryStore::new());
        seed_batch(&store, &[("Today", 42, 0.0)]).await;
        let today = Utc::now().date_naive();

        let uri = format!(
            "/api/v1/topics/trending/{}/{}/{}",
            today.format("%Y"),
            today.format("%m"),
            today.format("%d")
        );
        let (status, json) = get_json(app(Arc::clone(&store)), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["title"], "Today");

        let (status, json) = get_json(app(store), "/api/v1/topics/trending/2001/01/01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn trending_on_invalid_date_is_bad_request() {
        let (status, json) = get_json(
            app(Arc::new(MemoryStore::new())),
            "/api/v1/topics/trending/2025/02/30",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn discussions_are_listed_most_recent_first() {
        let store = Arc::new(MemoryStore::new());
        let topic = store.resolve_topic("Topic", None).await.expect("resolve");
        let item = |title: &str, secs: i64| NewDiscussionItem {
            subreddit: "r/news".to_owned(),
            title: title.to_owned(),
            body: String::new(),
            score: 3,
            url: format!("https://www.reddit.com/r/news/{title}"),
            posted_at: Utc.timestamp_opt(secs, 0).single().expect("ts"),
        };
        store
            .replace_discussion_items(&[(topic.id, vec![item("older", 100), item("newer", 200)])])
            .await
            .expect("seed");

        let (status, json) =
            get_json(app(store), &format!("/api/v1/topics/{}/discussions", topic.id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["title"], "newer");
        assert_eq!(json["data"][1]["title"], "older");
    }

    #[tokio::test]
    async fn missing_tone_chart_is_an_empty_histogram() {
        let (status, json) = get_json(
            app(Arc::new(MemoryStore::new())),
            "/api/v1/topics/12345/tone-chart",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], serde_json::json!({"histogram": []}));
    }

    #[tokio::test]
    async fn stored_tone_chart_is_returned() {
        let store = Arc::new(MemoryStore::new());
        let topic = store.resolve_topic("Topic", None).await.expect("resolve");
        let date = Utc::now().date_naive();
        store
            .upsert_tone_chart(
                topic.id,
                &ToneChartDocument::with_histogram("7d", date, vec![ToneBin { bin: 2, count: 7 }]),
            )
            .await
            .expect("seed");

        let (status, json) =
            get_json(app(store), &format!("/api/v1/topics/{}/tone-chart", topic.id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["timespan"], "7d");
        assert_eq!(json["data"]["histogram"][0]["count"], 7);
    }
}
