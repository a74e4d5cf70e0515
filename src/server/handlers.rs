//! HTTP request handlers.

use crate::error::{AppError, Result};
use crate::ingest::pull::DIRECT_FEEDS;
use crate::ingest::push::{self, SyncAck};
use crate::server::AppState;
use crate::view::{self, DisplayData, Layout};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

const ENDPOINTS: &[(&str, &str)] = &[
    ("/trmnl-data", "Full display data (recent books, suggestion, stats)"),
    ("/calibre-status", "Alias of /trmnl-data"),
    ("/trmnl-recent", "Compact display data (recent books, stats)"),
    ("/health", "Liveness and cache status"),
    ("/debug", "Cache contents and configuration"),
    ("/config", "Display options and data sources"),
    ("/clear-cache", "Reset the cache and re-ingest"),
    ("/sync", "Push a library snapshot (push mode)"),
];

// ============================================================================
// DISPLAY DATA
// ============================================================================

/// Display query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct DisplayParams {
    /// Number of recent books to return.
    pub book_limit: Option<usize>,
}

/// Display query string. Invalid values fall back to the defaults so the
/// display always receives a document.
type DisplayQuery = std::result::Result<Query<DisplayParams>, QueryRejection>;

fn requested_limit(query: DisplayQuery) -> Option<usize> {
    match query {
        Ok(Query(params)) => params.book_limit,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Ignoring invalid display query");
            None
        }
    }
}

/// Full display data.
pub async fn trmnl_data(State(state): State<AppState>, query: DisplayQuery) -> Json<DisplayData> {
    Json(render(&state, Layout::Full, requested_limit(query)))
}

/// Full display data, with options in a JSON body.
///
/// TRMNL polls with POST; an empty or unreadable body falls back to the
/// query string so the display always gets data.
pub async fn trmnl_data_post(
    State(state): State<AppState>,
    query: DisplayQuery,
    body: Bytes,
) -> Json<DisplayData> {
    let from_body = serde_json::from_slice::<DisplayParams>(&body)
        .ok()
        .and_then(|p| p.book_limit);

    Json(render(&state, Layout::Full, from_body.or(requested_limit(query))))
}

/// Compact display data.
pub async fn trmnl_recent(State(state): State<AppState>, query: DisplayQuery) -> Json<DisplayData> {
    Json(render(&state, Layout::Compact, requested_limit(query)))
}

fn render(state: &AppState, layout: Layout, book_limit: Option<usize>) -> DisplayData {
    let entry = state.cache.read();
    let limit = state.config.display.clamp_limit(book_limit);

    let data = view::build_display(
        &entry,
        state.ingestor.data_source(),
        layout,
        limit,
        Utc::now(),
        &mut rand::rng(),
    );

    tracing::debug!(
        books = data.recent_books_count,
        status = entry.status.as_str(),
        "Serving display data"
    );
    data
}

// ============================================================================
// SYNC
// ============================================================================

/// Accept a pushed library snapshot.
pub async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncAck>> {
    if !state.ingestor.accepts_push() {
        return Err(AppError::PushDisabled(format!(
            "server runs in {} mode",
            state.ingestor.name()
        )));
    }

    if !state.guard.authorize_request(&headers) {
        return Err(AppError::Unauthorized("invalid or missing sync token".to_string()));
    }

    let snapshot = push::snapshot_from_body(&body)?;
    let snapshot_id = snapshot.id().to_string();
    let stats = view::stats(Some(&snapshot));

    state.install(snapshot);
    let entry = state.cache.read();

    Ok(Json(SyncAck {
        status: "ok".to_string(),
        snapshot_id,
        total_books: stats.total_books,
        rated_books: stats.rated_books,
        rating_percentage: stats.rating_percentage,
        ingested_at: entry
            .ingested_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
    }))
}

/// Reset the cache.
///
/// Requires the sync token whenever one is configured.
pub async fn clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    if state.guard.is_configured() && !state.guard.authorize_request(&headers) {
        return Err(AppError::Unauthorized("invalid or missing sync token".to_string()));
    }

    state.cache.clear();
    let refresh_triggered = state.trigger_refresh();
    tracing::info!(refresh_triggered, "Cache cleared");

    Ok(Json(json!({
        "cleared": true,
        "refresh_triggered": refresh_triggered,
        "cache_status": state.cache.read().status,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

// ============================================================================
// STATUS
// ============================================================================

/// Service information.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    let endpoints: serde_json::Map<String, Value> = ENDPOINTS
        .iter()
        .map(|(path, about)| (path.to_string(), Value::from(*about)))
        .collect();

    Json(json!({
        "name": "trmnl-calibre",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Calibre library data for TRMNL e-ink displays",
        "ingest_mode": state.ingestor.name(),
        "data_source": state.ingestor.data_source(),
        "cache_status": state.cache.read().status,
        "endpoints": endpoints,
    }))
}

/// Health check.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let entry = state.cache.read();
    let now = Utc::now();

    let status = match entry.status {
        crate::cache::CacheStatus::Fresh => "healthy",
        crate::cache::CacheStatus::Stale => "degraded",
        crate::cache::CacheStatus::NeverPopulated => "starting",
    };

    Json(json!({
        "status": status,
        "timestamp": now.to_rfc3339(),
        "uptime_seconds": (now - state.started_at).num_seconds().max(0),
        "cache": {
            "status": entry.status,
            "total_books": entry.total_books(),
            "last_update": entry.ingested_at.map(|t| t.to_rfc3339()),
            "data_age_seconds": entry.age(now).map(|a| a.as_secs()),
            "last_error": entry.last_error,
        },
        "service_info": {
            "version": env!("CARGO_PKG_VERSION"),
            "ingest_mode": state.ingestor.name(),
            "data_source": state.ingestor.data_source(),
        },
    }))
}

/// Debug information. Never includes the sync token.
pub async fn debug(State(state): State<AppState>) -> Json<Value> {
    let entry = state.cache.read();
    let now = Utc::now();
    let config = &state.config;

    let snapshot = entry.snapshot.as_deref().map(|s| {
        json!({
            "id": s.id(),
            "source": s.source(),
            "captured_at": s.capture_time().to_rfc3339(),
            "total_books": s.total_books(),
            "rated_books": s.rated_books(),
            "sample_books": s.recent().take(3).collect::<Vec<_>>(),
        })
    });

    let pull_in_flight = match &state.ingestor {
        crate::ingest::Ingestor::Pull(source) => source.is_in_flight(),
        _ => false,
    };

    Json(json!({
        "cache": {
            "status": entry.status,
            "ingested_at": entry.ingested_at.map(|t| t.to_rfc3339()),
            "data_age_seconds": entry.age(now).map(|a| a.as_secs()),
            "ttl_seconds": state.cache.ttl().map(|t| t.as_secs()),
            "last_error": entry.last_error,
            "last_error_at": entry.last_error_at.map(|t| t.to_rfc3339()),
            "snapshot": snapshot,
        },
        "ingest": {
            "mode": state.ingestor.name(),
            "pull_in_flight": pull_in_flight,
        },
        "configuration": {
            "bind": config.server.bind.to_string(),
            "mode": config.ingest.mode,
            "calibre_base_url": config.ingest.base_url,
            "library_id": config.ingest.library_id,
            "interval_seconds": config.ingest.interval_seconds,
            "ttl_seconds": config.ingest.ttl_seconds,
            "request_timeout_seconds": config.ingest.request_timeout_seconds,
            "use_mock_data": config.ingest.use_mock_data,
            "sync_token": if state.guard.is_configured() { "<redacted>" } else { "<not set>" },
            "default_book_limit": config.display.default_book_limit,
            "max_book_limit": config.display.max_book_limit,
        },
        "timestamp": now.to_rfc3339(),
    }))
}

/// Display options and the data sources the service reads from.
pub async fn config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let mut opds_endpoints: Vec<String> = DIRECT_FEEDS.iter().map(|p| p.to_string()).collect();
    opds_endpoints.push("/opds (newest-books navigation link)".to_string());

    Json(json!({
        "ingest_mode": state.ingestor.name(),
        "data_source": state.ingestor.data_source(),
        "calibre_web": {
            "server_url": config.ingest.base_url,
            "library_id": config.ingest.library_id,
            "opds_endpoints": opds_endpoints,
            "interval_seconds": config.ingest.interval_seconds,
        },
        "display_options": {
            "book_limit": {
                "default": config.display.clamp_limit(None),
                "min": 1,
                "max": config.display.max_book_limit.max(1),
                "description": "Number of recent books to display",
            },
            "date_format": "MM/DD",
        },
        "available_fields": {
            "recent_books": [
                "index", "title", "author", "rating", "stars", "has_rating", "tags",
                "page_count", "series", "description", "date_added", "days_ago",
            ],
            "book_suggestion": ["title", "author", "tags", "rating", "page_count", "description"],
            "stats": ["total_books", "rated_books", "rating_percentage"],
            "status": [
                "server_status", "cache_status", "data_source", "last_update",
                "data_age_seconds", "current_time", "current_date",
            ],
        },
    }))
}

/// Unknown route.
pub async fn not_found() -> impl IntoResponse {
    let endpoints: Vec<&str> = ENDPOINTS.iter().map(|(path, _)| *path).collect();
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "message": format!("Available endpoints: /, {}", endpoints.join(", ")),
            "status": 404,
        })),
    )
}
