//! Attempt endpoints: create, list, stats and maintenance.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use practiscope_core::analytics::{GroupStats, Period, StatsQuery};
use practiscope_core::db::filter_value;
use practiscope_core::{
    AttemptFilter, AttemptPatch, AttemptRecord, CategoryFilter, Error, NewAttempt, PracticeKind,
};
use serde::Deserialize;

use super::error::ApiResult;
use super::AppState;

/// Query string of `GET /attempts` and the stats endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptParams {
    pub child_id: Option<String>,
    pub card_title: Option<String>,
    pub category: Option<String>,
    pub period: Option<String>,
    pub kind: Option<String>,
}

impl AttemptParams {
    fn stats_query(&self) -> StatsQuery {
        StatsQuery {
            child_id: self.child_id.clone(),
            category: self.category.clone(),
            period: Period::parse(self.period.as_deref()),
        }
    }
}

fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::validation("id", format!("'{}' is not an attempt id", raw)).into())
}

/// `POST /attempts`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewAttempt>, JsonRejection>,
) -> ApiResult<Json<AttemptRecord>> {
    let Json(attempt) = payload?;
    attempt.validate()?;

    let stored = state
        .assembler
        .run_write("insert_attempt", move |db| db.insert_attempt(&attempt))
        .await?;
    Ok(Json(stored))
}

/// `GET /attempts`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<AttemptParams>,
) -> ApiResult<Json<Vec<AttemptRecord>>> {
    let kind = filter_value(params.kind.as_deref())
        .map(|k| k.to_ascii_lowercase().parse::<PracticeKind>())
        .transpose()
        .map_err(|e| Error::validation("kind", e))?;

    let filter = AttemptFilter {
        child_id: filter_value(params.child_id.as_deref()),
        kind,
        card_title: filter_value(params.card_title.as_deref()),
        category: CategoryFilter::parse(
            params.category.as_deref(),
            state.assembler.settings().category_match,
        ),
        since: Period::parse(params.period.as_deref()).cutoff(Utc::now()),
        limit: None,
    };

    let attempts = state.assembler.list_attempts(filter).await?;
    Ok(Json(attempts))
}

/// `GET /attempts/stats/category`
pub async fn category_stats(
    State(state): State<AppState>,
    Query(params): Query<AttemptParams>,
) -> ApiResult<Json<Vec<GroupStats>>> {
    let stats = state
        .assembler
        .category_stats(&params.stats_query(), Utc::now())
        .await?;
    Ok(Json(stats))
}

/// `GET /attempts/stats/therapist`
pub async fn therapist_stats(
    State(state): State<AppState>,
    Query(params): Query<AttemptParams>,
) -> ApiResult<Json<Vec<GroupStats>>> {
    let stats = state
        .assembler
        .therapist_stats(&params.stats_query(), Utc::now())
        .await?;
    Ok(Json(stats))
}

/// `PUT /attempts/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AttemptPatch>, JsonRejection>,
) -> ApiResult<Json<AttemptRecord>> {
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    patch.validate()?;

    let updated = state
        .assembler
        .run_write("update_attempt", move |db| db.update_attempt(id, &patch))
        .await?;
    Ok(Json(updated))
}

/// `DELETE /attempts/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    state
        .assembler
        .run_write("delete_attempt", move |db| db.delete_attempt(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
