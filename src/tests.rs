use crate::agent::{self, SyncClient};
use crate::cache::{CacheStatus, FreshnessCache};
use crate::config::{Cli, Command, Config, IngestConfig, IngestMode, ServeArgs};
use crate::error::{AppError, IngestError};
use crate::ingest::{PullSource, RefreshOutcome, scheduler};
use crate::library::{Book, LibrarySnapshot};
use crate::server::{AppState, create_router};
use axum::Router;
use axum::http::StatusCode as AxumStatus;
use axum::routing::get;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{CommandFactory, Parser};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "correct-horse-battery-staple";

const NEWEST_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:dc="http://purl.org/dc/terms/">
  <title>Newest Books</title>
  <entry>
    <title>Dune</title>
    <author><name>Frank Herbert</name></author>
    <updated>2024-03-02T10:00:00+00:00</updated>
    <category term="Science Fiction" label="Science Fiction"/>
    <dc:rating>4</dc:rating>
  </entry>
  <entry>
    <title>Emma</title>
    <author><name>Jane Austen</name></author>
    <updated>2024-03-01T09:00:00+00:00</updated>
  </entry>
</feed>"#;

const ROOT_CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Calibre-web</title>
  <entry>
    <title>Newest Books</title>
    <link type="application/atom+xml;type=feed;profile=opds-catalog" href="/opds/navcatalog/newest"/>
  </entry>
</feed>"#;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn push_config() -> Config {
    let mut config = Config::default();
    config.ingest.mode = IngestMode::Push;
    config.sync.token = Some(TOKEN.to_string());
    config
}

fn mock_config() -> Config {
    let mut config = Config::default();
    config.ingest.use_mock_data = true;
    config
}

fn ingest_config(base_url: &str, timeout_secs: u64) -> IngestConfig {
    IngestConfig {
        base_url: base_url.to_string(),
        request_timeout_seconds: timeout_secs,
        ..IngestConfig::default()
    }
}

async fn spawn_app(state: AppState) -> String {
    spawn(create_router(state)).await
}

fn dune_and_emma() -> Value {
    json!({
        "source": "local_calibre",
        "books": [
            {
                "title": "Emma",
                "author": "Jane Austen",
                "tags": "Romance, Classic",
                "timestamp": "2024-03-01 09:00:00+00:00"
            },
            {
                "title": "Dune",
                "author": "Frank Herbert",
                "tags": "Science Fiction",
                "rating": 8,
                "page_count": 612,
                "timestamp": "2024-03-02 10:00:00+00:00"
            }
        ]
    })
}

async fn post_sync(base: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
    let mut request = reqwest::Client::new().post(format!("{}/sync", base)).json(body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.unwrap()
}

async fn get_json(url: &str) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// PUSH
// ============================================================================

#[tokio::test]
async fn push_then_read_reports_stats() {
    let base = spawn_app(AppState::new(push_config()).unwrap()).await;

    let response = post_sync(&base, Some(TOKEN), &dune_and_emma()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["total_books"], 2);

    let data = get_json(&format!("{}/trmnl-data", base)).await;
    assert_eq!(data["total_books"], 2);
    assert_eq!(data["rated_books"], 1);
    assert_eq!(data["rating_percentage"], 50);
    assert_eq!(data["server_status"], "Connected");
    assert_eq!(data["empty_library"], false);
    assert_eq!(data["data_source"], "Local Calibre sync");

    let recent = data["recent_books"].as_array().unwrap();
    assert_eq!(recent[0]["title"], "Dune");
    assert_eq!(recent[0]["rating"], "★★★★");
    assert_eq!(recent[0]["tags"], "Science Fiction");
    assert_eq!(recent[1]["title"], "Emma");
    assert_eq!(recent[1]["rating"], "");

    let suggested = data["book_suggestion"]["title"].as_str().unwrap();
    assert!(["Dune", "Emma"].contains(&suggested));
}

#[tokio::test]
async fn wrong_token_leaves_cache_unchanged() {
    let state = AppState::new(push_config()).unwrap();
    let base = spawn_app(state.clone()).await;

    post_sync(&base, Some(TOKEN), &dune_and_emma()).await;
    let before = state.cache.read();

    let replacement = json!({ "books": [{ "title": "Other", "author": "Someone" }] });
    let response = post_sync(&base, Some("wrong"), &replacement).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_sync(&base, None, &replacement).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let after = state.cache.read();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.total_books(), 2);
}

#[tokio::test]
async fn sync_token_header_is_accepted() {
    let base = spawn_app(AppState::new(push_config()).unwrap()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/sync", base))
        .header("X-Sync-Token", TOKEN)
        .json(&dune_and_emma())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_push_reports_zero_percent() {
    let base = spawn_app(AppState::new(push_config()).unwrap()).await;

    let response = post_sync(&base, Some(TOKEN), &json!({ "books": [] })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = get_json(&format!("{}/trmnl-data", base)).await;
    assert_eq!(data["total_books"], 0);
    assert_eq!(data["rating_percentage"], 0);
    assert_eq!(data["empty_library"], true);
    assert!(data["message"].as_str().unwrap().contains("no books"));
    assert!(data["book_suggestion"].is_null());
}

#[tokio::test]
async fn invalid_payload_is_rejected_and_previous_snapshot_kept() {
    let state = AppState::new(push_config()).unwrap();
    let base = spawn_app(state.clone()).await;
    post_sync(&base, Some(TOKEN), &dune_and_emma()).await;

    let bad = json!({ "books": [{ "title": "No author" }] });
    let response = post_sync(&base, Some(TOKEN), &bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("books[0]"));

    let bad_rating = json!({ "books": [{ "title": "T", "author": "A", "rating": 11 }] });
    let response = post_sync(&base, Some(TOKEN), &bad_rating).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = reqwest::Client::new()
        .post(format!("{}/sync", base))
        .bearer_auth(TOKEN)
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.cache.read().total_books(), 2);
}

#[tokio::test]
async fn sync_is_disabled_outside_push_mode() {
    let state = AppState::new(mock_config()).unwrap();
    let base = spawn_app(state).await;

    let response = post_sync(&base, Some(TOKEN), &dune_and_emma()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_pushes_calibre_library() {
    let dir = tempfile::tempdir().unwrap();
    crate::calibre::fixture::write_library(dir.path());

    let base = spawn_app(AppState::new(push_config()).unwrap()).await;

    let client = SyncClient::new(&base, TOKEN).unwrap();
    let ack = agent::run(dir.path(), &client, 50).await.unwrap();
    assert_eq!(ack.total_books, 3);
    assert_eq!(ack.rated_books, 2);
    assert_eq!(ack.rating_percentage, 67);

    let data = get_json(&format!("{}/trmnl-data", base)).await;
    assert_eq!(data["recent_books"][0]["title"], "Dune");
    assert_eq!(data["recent_books"][0]["series"], "Dune Chronicles");

    let wrong = SyncClient::new(&base, "nope").unwrap();
    let err = agent::run(dir.path(), &wrong, 50).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

// ============================================================================
// READ ENDPOINTS
// ============================================================================

#[tokio::test]
async fn never_populated_cache_reads_are_well_formed() {
    let base = spawn_app(AppState::new(push_config()).unwrap()).await;

    let data = get_json(&format!("{}/trmnl-data", base)).await;
    assert_eq!(data["total_books"], 0);
    assert_eq!(data["rated_books"], 0);
    assert_eq!(data["rating_percentage"], 0);
    assert_eq!(data["server_status"], "No data yet");
    assert_eq!(data["last_update"], "Never");
    assert_eq!(data["cache_status"], "never_populated");
    assert_eq!(data["recent_books"], json!([]));

    let health = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["status"], "starting");
    assert_eq!(health["cache"]["total_books"], 0);
}

#[tokio::test]
async fn mock_mode_serves_fixture_library() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let base = spawn_app(state).await;

    let data = get_json(&format!("{}/calibre-status", base)).await;
    assert_eq!(data["total_books"], 8);
    assert_eq!(data["rated_books"], 6);
    assert_eq!(data["rating_percentage"], 75);
    assert_eq!(data["data_source"], "Mock data");
    assert_eq!(data["recent_books"][0]["title"], "Dune");
    assert_eq!(data["book_limit_used"], 10);
}

#[tokio::test]
async fn book_limit_from_query_and_body() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let base = spawn_app(state).await;

    let data = get_json(&format!("{}/trmnl-data?book_limit=3", base)).await;
    assert_eq!(data["recent_books"].as_array().unwrap().len(), 3);
    assert_eq!(data["recent_books_count"], 3);

    let data: Value = reqwest::Client::new()
        .post(format!("{}/trmnl-data", base))
        .json(&json!({ "book_limit": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(data["recent_books"].as_array().unwrap().len(), 2);

    let data = get_json(&format!("{}/trmnl-data?book_limit=500", base)).await;
    assert_eq!(data["book_limit_used"], 50);
    assert_eq!(data["recent_books"].as_array().unwrap().len(), 8);

    let data = get_json(&format!("{}/trmnl-data?book_limit=0", base)).await;
    assert_eq!(data["book_limit_used"], 1);
}

#[tokio::test]
async fn invalid_book_limit_falls_back_to_default() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let base = spawn_app(state).await;

    for path in [
        "/trmnl-data?book_limit=abc",
        "/trmnl-data?book_limit=-1",
        "/calibre-status?book_limit=",
        "/trmnl-recent?book_limit=abc",
    ] {
        let response = reqwest::get(format!("{}{}", base, path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
        let data: Value = response.json().await.unwrap();
        assert_eq!(data["book_limit_used"], 10, "{}", path);
        assert_eq!(data["total_books"], 8, "{}", path);
    }

    let data: Value = reqwest::Client::new()
        .post(format!("{}/trmnl-data?book_limit=abc", base))
        .json(&json!({ "book_limit": 4 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(data["book_limit_used"], 4);
}

#[tokio::test]
async fn config_endpoint_lists_display_options() {
    let mut config = mock_config();
    config.display.default_book_limit = 5;
    config.display.max_book_limit = 20;
    config.sync.token = Some(TOKEN.to_string());
    let base = spawn_app(AppState::new(config).unwrap()).await;

    let response = reqwest::get(format!("{}/config", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(!text.contains(TOKEN));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["display_options"]["book_limit"]["default"], 5);
    assert_eq!(body["display_options"]["book_limit"]["min"], 1);
    assert_eq!(body["display_options"]["book_limit"]["max"], 20);
    assert_eq!(body["calibre_web"]["opds_endpoints"][0], "/opds/new");
    assert_eq!(body["calibre_web"]["library_id"], "Calibre_Library");
    assert!(
        body["available_fields"]["recent_books"]
            .as_array()
            .unwrap()
            .contains(&json!("title"))
    );

    let index = get_json(&format!("{}/", base)).await;
    assert!(index["endpoints"].get("/config").is_some());
}

#[tokio::test]
async fn compact_layout_has_no_suggestion() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let base = spawn_app(state).await;

    let data = get_json(&format!("{}/trmnl-recent", base)).await;
    assert!(data.get("book_suggestion").is_none());
    assert_eq!(data["total_books"], 8);
}

#[tokio::test]
async fn suggestion_is_always_from_snapshot() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let titles: Vec<String> = state
        .cache
        .read()
        .snapshot
        .as_ref()
        .unwrap()
        .books()
        .iter()
        .map(|b| b.title.clone())
        .collect();
    let base = spawn_app(state).await;

    for _ in 0..20 {
        let data = get_json(&format!("{}/trmnl-data?book_limit=1", base)).await;
        let title = data["book_suggestion"]["title"].as_str().unwrap();
        assert!(titles.iter().any(|t| t == title));
    }
}

#[tokio::test]
async fn debug_never_echoes_token() {
    let state = AppState::new(push_config()).unwrap();
    let base = spawn_app(state).await;
    post_sync(&base, Some(TOKEN), &dune_and_emma()).await;

    let text = reqwest::get(format!("{}/debug", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!text.contains(TOKEN));

    let debug: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(debug["configuration"]["sync_token"], "<redacted>");
    assert_eq!(debug["cache"]["snapshot"]["source"], "push:local_calibre");
    assert_eq!(debug["cache"]["snapshot"]["sample_books"][0]["title"], "Dune");
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let base = spawn_app(AppState::new(mock_config()).unwrap()).await;

    let response = reqwest::get(format!("{}/nope", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("/trmnl-data"));

    let index = get_json(&format!("{}/", base)).await;
    assert_eq!(index["ingest_mode"], "mock");
}

// ============================================================================
// CLEAR CACHE
// ============================================================================

#[tokio::test]
async fn clear_cache_requires_token_when_configured() {
    let state = AppState::new(push_config()).unwrap();
    let base = spawn_app(state.clone()).await;
    post_sync(&base, Some(TOKEN), &dune_and_emma()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/clear-cache", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.cache.read().total_books(), 2);

    let response = reqwest::Client::new()
        .post(format!("{}/clear-cache", base))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["refresh_triggered"], false);
    assert_eq!(state.cache.read().status, CacheStatus::NeverPopulated);
}

#[tokio::test]
async fn clear_cache_in_mock_mode_reinstalls_fixture() {
    let state = AppState::new(mock_config()).unwrap();
    state.load_initial();
    let first_id = state.cache.read().snapshot.as_ref().unwrap().id().to_string();
    let base = spawn_app(state.clone()).await;

    let body = get_json(&format!("{}/clear-cache", base)).await;
    assert_eq!(body["refresh_triggered"], true);

    let entry = state.cache.read();
    assert_eq!(entry.total_books(), 8);
    assert_ne!(entry.snapshot.as_ref().unwrap().id(), first_id);
}

// ============================================================================
// PULL
// ============================================================================

fn opds_direct() -> Router {
    Router::new().route("/opds/new", get(|| async { NEWEST_FEED }))
}

fn opds_navigation() -> Router {
    Router::new()
        .route("/opds", get(|| async { ROOT_CATALOG }))
        .route("/opds/navcatalog/newest", get(|| async { NEWEST_FEED }))
}

fn opds_broken() -> Router {
    Router::new().fallback(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") })
}

fn opds_slow(delay: Duration) -> Router {
    Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        NEWEST_FEED
    })
}

#[tokio::test]
async fn pull_reads_direct_feed() {
    let base = spawn(opds_direct()).await;
    let source = PullSource::new(&ingest_config(&base, 5)).unwrap();
    let cache = FreshnessCache::new(Some(Duration::from_secs(300)));

    let outcome = source.refresh(&cache).await;
    assert_eq!(outcome, RefreshOutcome::Updated { books: 2 });

    let entry = cache.read();
    assert_eq!(entry.status, CacheStatus::Fresh);
    let snapshot = entry.snapshot.as_ref().unwrap();
    assert_eq!(snapshot.source(), "opds");
    assert_eq!(snapshot.rated_books(), 1);
    assert_eq!(snapshot.recent().next().unwrap().title, "Dune");
}

#[tokio::test]
async fn pull_follows_newest_navigation_link() {
    let base = spawn(opds_navigation()).await;
    let source = PullSource::new(&ingest_config(&base, 5)).unwrap();
    let cache = FreshnessCache::new(Some(Duration::from_secs(300)));

    let outcome = source.refresh(&cache).await;
    assert_eq!(outcome, RefreshOutcome::Updated { books: 2 });
}

#[tokio::test]
async fn failed_pull_keeps_snapshot_and_goes_stale_after_ttl() {
    let base = spawn(opds_broken()).await;
    let source = PullSource::new(&ingest_config(&base, 5)).unwrap();
    let cache = FreshnessCache::new(Some(Duration::from_secs(60)));

    let old = LibrarySnapshot::new(
        vec![Book::new("Dune", "Frank Herbert", Utc::now())],
        "opds",
    );
    cache.replace_at(old, Utc::now() - ChronoDuration::minutes(10));

    match source.refresh(&cache).await {
        RefreshOutcome::Failed { error, status } => {
            assert!(matches!(error, IngestError::Fetch(_)));
            assert_eq!(status, CacheStatus::Stale);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let entry = cache.read();
    assert_eq!(entry.total_books(), 1);
    assert_eq!(entry.status, CacheStatus::Stale);
    assert!(entry.last_error.is_some());
}

#[tokio::test]
async fn failed_pull_within_ttl_stays_fresh() {
    let base = spawn(opds_broken()).await;
    let source = PullSource::new(&ingest_config(&base, 5)).unwrap();
    let cache = FreshnessCache::new(Some(Duration::from_secs(300)));
    cache.replace(LibrarySnapshot::new(Vec::new(), "opds"));

    let outcome = source.refresh(&cache).await;
    assert!(matches!(
        outcome,
        RefreshOutcome::Failed {
            status: CacheStatus::Fresh,
            ..
        }
    ));
}

#[tokio::test]
async fn slow_server_times_out() {
    let base = spawn(opds_slow(Duration::from_secs(3))).await;
    let source = PullSource::new(&ingest_config(&base, 1)).unwrap();
    let cache = FreshnessCache::new(Some(Duration::from_secs(300)));

    let outcome = source.refresh(&cache).await;
    assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
    assert_eq!(cache.read().status, CacheStatus::NeverPopulated);
}

#[tokio::test]
async fn concurrent_pull_is_skipped() {
    let base = spawn(opds_slow(Duration::from_millis(500))).await;
    let source = Arc::new(PullSource::new(&ingest_config(&base, 5)).unwrap());
    let cache = Arc::new(FreshnessCache::new(Some(Duration::from_secs(300))));

    let first = {
        let source = source.clone();
        let cache = cache.clone();
        tokio::spawn(async move { source.refresh(&cache).await })
    };

    wait_for(|| source.is_in_flight()).await;
    assert_eq!(source.refresh(&cache).await, RefreshOutcome::Skipped);

    assert_eq!(first.await.unwrap(), RefreshOutcome::Updated { books: 2 });
    assert!(!source.is_in_flight());
}

#[tokio::test]
async fn scheduler_pulls_immediately_and_stops_on_cancel() {
    let base = spawn(opds_direct()).await;
    let source = Arc::new(PullSource::new(&ingest_config(&base, 5)).unwrap());
    let cache = Arc::new(FreshnessCache::new(Some(Duration::from_secs(300))));
    let cancel = CancellationToken::new();

    let task = scheduler::spawn_pull_task(
        source,
        cache.clone(),
        Duration::from_secs(3600),
        cancel.clone(),
    );

    wait_for(|| cache.read().total_books() == 2).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn clear_cache_in_pull_mode_triggers_refresh() {
    let calibre = spawn(opds_direct()).await;
    let mut config = Config::default();
    config.ingest.base_url = calibre;

    let state = AppState::new(config).unwrap();
    let base = spawn_app(state.clone()).await;

    let body = get_json(&format!("{}/clear-cache", base)).await;
    assert_eq!(body["refresh_triggered"], true);

    wait_for(|| state.cache.read().total_books() == 2).await;
    let data = get_json(&format!("{}/trmnl-data", base)).await;
    assert_eq!(data["data_source"], "Calibre-web OPDS");
    assert_eq!(data["rating_percentage"], 50);
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn config_file_parses_with_defaults() {
    let config: Config = toml::from_str(
        r#"
        [ingest]
        mode = "push"

        [sync]
        token = "abc"
        "#,
    )
    .unwrap();

    assert_eq!(config.ingest.mode, IngestMode::Push);
    assert_eq!(config.ingest.interval_seconds, 300);
    assert_eq!(config.server.bind.port(), 5052);
    assert_eq!(config.display.default_book_limit, 10);
    assert!(config.validate().is_ok());
    assert!(!format!("{:?}", config).contains("abc"));
}

#[test]
fn generated_default_config_is_valid() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.ingest.mode, IngestMode::Pull);
    assert!(config.validate().is_ok());
}

#[test]
fn startup_requirements_are_enforced() {
    let mut config = Config::default();
    config.ingest.mode = IngestMode::Push;
    assert!(matches!(config.validate(), Err(AppError::Config(_))));
    assert!(AppState::new(config.clone()).is_err());

    config.sync.token = Some("   ".to_string());
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ingest.base_url = "calibre.local".to_string();
    assert!(config.validate().is_err());

    config.ingest.use_mock_data = true;
    assert!(config.validate().is_ok());
}

#[test]
fn overrides_replace_file_values() {
    let mut config = Config::default();
    let args = ServeArgs {
        port: Some(8081),
        mode: Some(IngestMode::Push),
        sync_token: Some(TOKEN.to_string()),
        calibre_base_url: Some("http://calibre:8083".to_string()),
        library_id: Some("Books".to_string()),
        ..ServeArgs::default()
    };

    config.apply_overrides(&args);

    assert_eq!(config.server.bind.port(), 8081);
    assert_eq!(config.ingest.mode, IngestMode::Push);
    assert_eq!(config.sync.token.as_deref(), Some(TOKEN));
    assert_eq!(config.ingest.base_url, "http://calibre:8083");
    assert_eq!(config.ingest.library_id, "Books");
    assert!(!config.ingest.use_mock_data);
}

#[test]
fn mock_data_flag_accepts_common_spellings() {
    let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap().serve.use_mock_data;

    assert!(parse(&["trmnl-calibre", "--use-mock-data=1"]));
    assert!(parse(&["trmnl-calibre", "--use-mock-data=yes"]));
    assert!(parse(&["trmnl-calibre", "--use-mock-data=true"]));
    assert!(!parse(&["trmnl-calibre", "--use-mock-data=0"]));
    assert!(!parse(&["trmnl-calibre", "--use-mock-data=no"]));
    assert!(!parse(&["trmnl-calibre", "--use-mock-data=false"]));
}

#[test]
fn bare_mock_data_flag_does_not_swallow_subcommand() {
    let cli = Cli::try_parse_from(["trmnl-calibre", "--use-mock-data", "token"]).unwrap();
    assert!(cli.serve.use_mock_data);
    assert!(matches!(cli.command, Some(Command::Token)));
}

#[test]
fn mock_data_flag_reads_environment() {
    let command = Cli::command();
    let arg = command
        .get_arguments()
        .find(|a| a.get_id() == "use_mock_data")
        .unwrap();
    assert_eq!(arg.get_env(), Some(OsStr::new("USE_MOCK_DATA")));
}
