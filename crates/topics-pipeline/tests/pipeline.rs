//! End-to-end pipeline tests against the in-memory store and mocked sources.

use std::collections::HashMap;
use std::env::VarError;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::broadcast::error::TryRecvError;
use topics_db::memory::MemoryStore;
use topics_db::{NewDiscussionItem, SharedStore, TopicStore};
use topics_core::AppConfig;
use topics_pipeline::{
    CycleOutcome, DiscussionEnricher, EnrichmentSummary, FeaturedIngestor, Pipeline, RefreshBus,
    RefreshEvent, ToneEnricher,
};
use topics_sources::{DiscussionSource, FeedSource, SourceClient, SourceSettings, ToneSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn client(name: &str, base_url: &str, max_concurrency: usize) -> SourceClient {
    SourceClient::new(SourceSettings {
        name: name.to_owned(),
        base_url: base_url.to_owned(),
        timeout_secs: 5,
        user_agent: "topics-test".to_owned(),
        max_concurrency,
        max_body_bytes: 1024 * 1024,
        max_retries: 0,
        retry_backoff_base_ms: 0,
        request_spacing: StdDuration::ZERO,
    })
    .expect("client construction should not fail")
}

fn stores() -> (Arc<MemoryStore>, SharedStore) {
    let memory = Arc::new(MemoryStore::new());
    let shared: SharedStore = memory.clone();
    (memory, shared)
}

fn ingestor(store: SharedStore, feed_uri: &str, bus: RefreshBus) -> FeaturedIngestor {
    FeaturedIngestor::new(
        store,
        FeedSource::new(client("feed", feed_uri, 5), "en"),
        bus,
        Duration::minutes(59),
        5,
    )
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn two_article_feed() -> serde_json::Value {
    serde_json::json!({
        "mostread": {"articles": [
            {
                "titles": {"normalized": "Rising"},
                "views": 3000,
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Rising"}},
                "view_history": [{"views": 1000}, {"views": 2000}, {"views": 3000}]
            },
            {
                "titles": {"normalized": "Falling"},
                "views": 1000,
                "view_history": [{"views": 3000}, {"views": 2000}, {"views": 1000}]
            }
        ]}
    })
}

async fn mount_feed(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn event(titles: &[&str]) -> RefreshEvent {
    RefreshEvent {
        created_at: Utc::now(),
        topic_titles: titles.iter().map(|t| (*t).to_owned()).collect(),
    }
}

fn listing(titles: &[&str]) -> serde_json::Value {
    let children: Vec<serde_json::Value> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            serde_json::json!({"data": {
                "subreddit_name_prefixed": "r/news",
                "title": title,
                "selftext": "",
                "ups": i,
                "permalink": format!("/r/news/comments/{i}/"),
                "created_utc": 1_736_900_000.0 + f64::from(u32::try_from(i).unwrap())
            }})
        })
        .collect();
    serde_json::json!({"data": {"children": children}})
}

fn config(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = overrides
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    vars.insert("DATABASE_URL".to_owned(), "postgres://localhost/topics".to_owned());
    topics_core::build_app_config(|key| vars.get(key).cloned().ok_or(VarError::NotPresent))
        .expect("test config should parse")
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_records_views_with_trend_signs_and_publishes() {
    let server = MockServer::start().await;
    mount_feed(&server, two_article_feed()).await;
    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let mut rx = bus.subscribe();

    let published = ingestor(Arc::clone(&store), &server.uri(), bus)
        .ingest(today())
        .await
        .expect("ingest should succeed")
        .expect("event for non-empty feed");

    assert_eq!(published.topic_titles, vec!["Rising", "Falling"]);
    assert_eq!(rx.try_recv().expect("event on bus"), published);
    assert_eq!(memory.snapshot_count(), 2);

    let ranked = store.list_latest_ranked_topics(10).await.expect("ranked");
    assert_eq!(ranked[0].title, "Rising");
    assert_eq!(ranked[0].views, 3000);
    assert!(ranked[0].trend > 0.0);
    assert_eq!(ranked[1].title, "Falling");
    assert!(ranked[1].trend < 0.0);
    assert_eq!(
        ranked[0].url.as_deref(),
        Some("https://en.wikipedia.org/wiki/Rising")
    );
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshots_and_publishes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_article_feed()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let mut rx = bus.subscribe();
    let ingestor = ingestor(store, &server.uri(), bus);

    ingestor.ingest(today()).await.expect("first ingest");
    rx.try_recv().expect("first event");

    let result = ingestor.ingest(today()).await;

    assert!(result.is_err());
    assert_eq!(memory.snapshot_count(), 2);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn failed_commit_publishes_nothing() {
    let server = MockServer::start().await;
    mount_feed(&server, two_article_feed()).await;
    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let mut rx = bus.subscribe();
    let ingestor = ingestor(store, &server.uri(), bus);

    memory.fail_writes(true);

    let result = ingestor.ingest(today()).await;

    assert!(result.is_err());
    assert_eq!(memory.snapshot_count(), 0);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn empty_feed_is_a_no_op() {
    let server = MockServer::start().await;
    mount_feed(&server, serde_json::json!({"mostread": {"articles": []}})).await;
    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let mut rx = bus.subscribe();

    let ingestor = ingestor(store, &server.uri(), bus);

    let outcome = ingestor
        .ingest(today())
        .await
        .expect("ingest should succeed");

    assert!(outcome.is_none());
    assert_eq!(memory.snapshot_count(), 0);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn refresh_cycle_is_gated_on_snapshot_age() {
    let server = MockServer::start().await;
    mount_feed(&server, two_article_feed()).await;
    let (memory, store) = stores();
    let ingestor = ingestor(store, &server.uri(), RefreshBus::new(4));

    let first = ingestor
        .ingest(today())
        .await
        .expect("seed ingest")
        .expect("event");

    let outcome = ingestor
        .run_refresh_cycle(first.created_at + Duration::minutes(30))
        .await
        .expect("cycle");
    assert_eq!(outcome, CycleOutcome::Fresh, "30 minutes after a refresh the cycle must skip");
    assert_eq!(memory.snapshot_count(), 2);

    let outcome = ingestor
        .run_refresh_cycle(first.created_at + Duration::minutes(60))
        .await
        .expect("cycle");
    assert!(outcome.ran(), "60 minutes after a refresh the cycle must run");
    assert_eq!(memory.snapshot_count(), 4);
}

#[tokio::test]
async fn first_cycle_with_no_history_runs() {
    let server = MockServer::start().await;
    mount_feed(&server, two_article_feed()).await;
    let (memory, store) = stores();

    let outcome = ingestor(store, &server.uri(), RefreshBus::new(4))
        .run_refresh_cycle(Utc::now())
        .await
        .expect("cycle");

    assert!(matches!(outcome, CycleOutcome::Ran(Some(_))));
    assert_eq!(memory.snapshot_count(), 2);
}

#[tokio::test]
async fn overlapping_cycles_ingest_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(two_article_feed())
                .set_delay(StdDuration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let mut rx = bus.subscribe();
    let ingestor = ingestor(store, &server.uri(), bus);
    let now = Utc::now();

    let (a, b) = tokio::join!(ingestor.run_refresh_cycle(now), ingestor.run_refresh_cycle(now));
    let outcomes = [a.expect("first cycle"), b.expect("second cycle")];

    assert_eq!(outcomes.iter().filter(|o| o.ran()).count(), 1);
    assert!(outcomes.contains(&CycleOutcome::Busy));
    assert_eq!(memory.snapshot_count(), 2);
    rx.try_recv().expect("one event");
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    server.verify().await;
}

#[tokio::test]
async fn cycle_lock_is_released_after_a_run() {
    let server = MockServer::start().await;
    mount_feed(&server, two_article_feed()).await;
    let (memory, store) = stores();
    let ingestor = ingestor(store, &server.uri(), RefreshBus::new(4));
    let now = Utc::now();

    assert!(ingestor.run_refresh_cycle(now).await.expect("first").ran());
    let second = ingestor
        .run_refresh_cycle(now + Duration::minutes(120))
        .await
        .expect("second");

    assert!(second.ran());
    assert_eq!(memory.snapshot_count(), 4);
}

// ---------------------------------------------------------------------------
// Discussion enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn discussion_failure_for_one_topic_does_not_block_another() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "Alpha"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "Beta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["b1", "b2"])))
        .mount(&server)
        .await;

    let (memory, store) = stores();
    let alpha = memory.resolve_topic("Alpha", None).await.expect("alpha");
    let beta = memory.resolve_topic("Beta", None).await.expect("beta");
    let previous = NewDiscussionItem {
        subreddit: "r/old".to_owned(),
        title: "kept".to_owned(),
        body: String::new(),
        score: 1,
        url: "https://www.reddit.com/r/old/".to_owned(),
        posted_at: Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts"),
    };
    memory
        .replace_discussion_items(&[(alpha.id, vec![previous])])
        .await
        .expect("seed");

    let enricher = DiscussionEnricher::new(
        store,
        DiscussionSource::new(client("reddit", &server.uri(), 1), 10),
    );
    let summary = enricher.handle(&event(&["Alpha", "Beta"])).await;

    assert_eq!(summary.topics, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 1);

    let alpha_items = memory.list_discussion_items(alpha.id).await.expect("alpha");
    assert_eq!(alpha_items.len(), 1);
    assert_eq!(alpha_items[0].title, "kept");

    let beta_items = memory.list_discussion_items(beta.id).await.expect("beta");
    let titles: Vec<&str> = beta_items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["b2", "b1"]);
}

#[tokio::test]
async fn empty_discussion_result_clears_previous_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&[])))
        .mount(&server)
        .await;

    let (memory, store) = stores();
    let quiet = memory.resolve_topic("Quiet", None).await.expect("quiet");
    let stale = NewDiscussionItem {
        subreddit: "r/old".to_owned(),
        title: "yesterday".to_owned(),
        body: String::new(),
        score: 1,
        url: "https://www.reddit.com/r/old/".to_owned(),
        posted_at: Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts"),
    };
    memory
        .replace_discussion_items(&[(quiet.id, vec![stale])])
        .await
        .expect("seed");

    let enricher = DiscussionEnricher::new(
        store,
        DiscussionSource::new(client("reddit", &server.uri(), 1), 10),
    );
    let summary = enricher.handle(&event(&["Quiet"])).await;

    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 0);
    assert!(memory.list_discussion_items(quiet.id).await.expect("items").is_empty());
}

#[tokio::test]
async fn discussion_enrichment_skips_unknown_titles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["x"])))
        .expect(0)
        .mount(&server)
        .await;
    let (_memory, store) = stores();

    let enricher = DiscussionEnricher::new(
        store,
        DiscussionSource::new(client("reddit", &server.uri(), 1), 10),
    );
    let summary = enricher.handle(&event(&["Never Seen"])).await;

    assert_eq!(summary.topics, 0);
    server.verify().await;
}

// ---------------------------------------------------------------------------
// Tone enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tone_failure_stores_empty_histogram() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("query", "\"Alpha\""))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("query", "\"Beta\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tonechart": [{"bin": -1, "count": 3}, {"bin": 4, "count": 6}]
        })))
        .mount(&server)
        .await;

    let (memory, store) = stores();
    let alpha = memory.resolve_topic("Alpha", None).await.expect("alpha");
    let beta = memory.resolve_topic("Beta", None).await.expect("beta");

    let enricher = ToneEnricher::new(store, ToneSource::new(client("gdelt", &server.uri(), 5), "7d"));
    let summary = enricher.handle(&event(&["Alpha", "Beta"])).await;

    assert_eq!(summary.topics, 2);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, 1);

    let alpha_chart = memory.get_tone_chart(alpha.id).await.expect("get").expect("stored");
    assert!(alpha_chart.histogram.is_empty());
    assert_eq!(alpha_chart.timespan.as_deref(), Some("7d"));

    let beta_chart = memory.get_tone_chart(beta.id).await.expect("get").expect("stored");
    assert_eq!(beta_chart.histogram.len(), 2);
}

// ---------------------------------------------------------------------------
// Bus fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn both_consumers_receive_each_refresh() {
    let feed = MockServer::start().await;
    mount_feed(&feed, two_article_feed()).await;
    let reddit = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["post"])))
        .mount(&reddit)
        .await;
    let gdelt = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tonechart": [{"bin": 0, "count": 1}]
        })))
        .mount(&gdelt)
        .await;

    let (memory, store) = stores();
    let bus = RefreshBus::new(4);
    let discussions = Arc::new(DiscussionEnricher::new(
        Arc::clone(&store),
        DiscussionSource::new(client("reddit", &reddit.uri(), 1), 10),
    ));
    let tone = Arc::new(ToneEnricher::new(
        Arc::clone(&store),
        ToneSource::new(client("gdelt", &gdelt.uri(), 5), "7d"),
    ));
    let handles = [
        discussions.spawn(bus.subscribe()),
        tone.spawn(bus.subscribe()),
    ];

    let ingestor = ingestor(Arc::clone(&store), &feed.uri(), bus.clone());
    ingestor.ingest(today()).await.expect("ingest");
    drop(ingestor);
    drop(bus);

    for handle in handles {
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("consumer should stop once the bus closes")
            .expect("consumer task should not panic");
    }

    for title in ["Rising", "Falling"] {
        let topic = memory
            .find_topic_by_title(title)
            .await
            .expect("find")
            .expect("topic exists");
        assert_eq!(memory.list_discussion_items(topic.id).await.expect("items").len(), 1);
        assert!(memory.get_tone_chart(topic.id).await.expect("chart").is_some());
    }
}

#[tokio::test]
async fn disabled_consumer_is_never_subscribed() {
    let reddit = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["post"])))
        .expect(0)
        .mount(&reddit)
        .await;
    let gdelt = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tonechart": [{"bin": 2, "count": 4}]
        })))
        .mount(&gdelt)
        .await;
    let reddit_uri = reddit.uri();
    let gdelt_uri = gdelt.uri();
    let config = config(&[
        ("TOPICS_DISCUSSION_ENABLED", "false"),
        ("TOPICS_DISCUSSION_BASE_URL", reddit_uri.as_str()),
        ("TOPICS_TONE_BASE_URL", gdelt_uri.as_str()),
    ]);

    let (memory, store) = stores();
    let alpha = memory.resolve_topic("Alpha", None).await.expect("alpha");
    let pipeline = Pipeline::from_config(&config, store).expect("pipeline");

    assert!(pipeline.discussions.is_none());
    assert!(pipeline.tone.is_some());
    let handles = pipeline.spawn_consumers();
    assert_eq!(handles.len(), 1);
    assert_eq!(pipeline.bus.subscriber_count(), 1);

    let (discussions, tone) = pipeline.enrich(&event(&["Alpha"])).await;
    assert_eq!(discussions, EnrichmentSummary::default());
    assert_eq!(tone.written, 1);
    assert!(memory.get_tone_chart(alpha.id).await.expect("chart").is_some());

    for handle in handles {
        handle.abort();
    }
    reddit.verify().await;
}
