//! HTTP surface of the analytics service.
//!
//! Routes:
//! - `POST /attempts`, `GET /attempts`
//! - `GET /attempts/stats/category`, `GET /attempts/stats/therapist`
//! - `PUT /attempts/{id}`, `DELETE /attempts/{id}`
//! - `GET /children/{child_id}/report`
//! - `GET|PUT /thresholds/{child_id}/{emotion}`
//! - `GET /health`

mod attempts;
mod children;
mod error;
mod thresholds;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use practiscope_core::analytics::{ReportAssembler, ReportSettings};
use practiscope_core::config::AnalyticsConfig;
use practiscope_core::Database;
use serde_json::{json, Value};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub assembler: ReportAssembler,
}

impl AppState {
    pub fn new(db: Arc<Database>, analytics: &AnalyticsConfig) -> Self {
        Self {
            assembler: ReportAssembler::new(db, ReportSettings::from(analytics)),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/attempts", get(attempts::list).post(attempts::create))
        .route("/attempts/stats/category", get(attempts::category_stats))
        .route("/attempts/stats/therapist", get(attempts::therapist_stats))
        .route(
            "/attempts/{id}",
            axum::routing::put(attempts::update).delete(attempts::delete),
        )
        .route("/children/{child_id}/report", get(children::report))
        .route(
            "/thresholds/{child_id}/{emotion}",
            get(thresholds::get).put(thresholds::put),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    response
}
