//! # cfw-api: Custom Compliance Framework Service
//!
//! Axum service that imports custom compliance frameworks, keeps one
//! catalog per tenant, attaches frameworks to host projects, tracks
//! per-leaf implementation records and reports progress.
//!
//! ## API Surface
//!
//! Everything below is mounted under `/plugins/{plugin_key}`
//! (default `custom-framework-import`).
//!
//! | Path                          | Module                   | Domain            |
//! |-------------------------------|--------------------------|-------------------|
//! | `/frameworks/*`               | [`routes::frameworks`]   | Catalog           |
//! | `/import*`, `/template*`      | [`routes::frameworks`]   | Ingestion         |
//! | `/projects/*`                 | [`routes::projects`]     | Projects/progress |
//! | `/add-to-project`, `/remove-from-project` | [`routes::projects`] | Associations |
//! | `/openapi.json`               | [`openapi`]              | API docs          |
//!
//! Health probes (`/health/*`) and `/metrics` sit at the root.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → DefaultBodyLimit → Handler
//! ```

pub mod catalog;
pub mod db;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;
pub mod tenant;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let prefix = format!("/plugins/{}", state.config.plugin_key);

    let api = Router::new()
        .merge(routes::frameworks::router())
        .merge(routes::projects::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(state.config.max_import_bytes));

    let mut unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if state.config.metrics_enabled {
        unauthenticated = unauthenticated.route("/metrics", get(prometheus_metrics));
    }

    Router::new()
        .merge(unauthenticated)
        .nest(&prefix, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics: Prometheus text exposition.
///
/// 503 when no recorder was installed for this process.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready", or 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
