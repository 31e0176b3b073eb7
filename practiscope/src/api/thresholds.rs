//! Evaluator threshold read/write.
//!
//! These values are consumed by the real-time evaluator that decides
//! `passed`; the analytics engine itself never reads them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use practiscope_core::analytics::require_child_id;
use practiscope_core::{Emotion, Error, ThresholdConfig, ThresholdUpdate};

use super::error::ApiResult;
use super::AppState;

fn parse_target(child_id: &str, emotion: &str) -> ApiResult<(String, Emotion)> {
    let child_id = require_child_id(Some(child_id))?;
    let emotion = emotion
        .trim()
        .to_ascii_lowercase()
        .parse::<Emotion>()
        .map_err(|e| Error::validation("emotion", e))?;
    Ok((child_id, emotion))
}

/// `GET /thresholds/{child_id}/{emotion}`
pub async fn get(
    State(state): State<AppState>,
    Path((child_id, emotion)): Path<(String, String)>,
) -> ApiResult<Json<ThresholdConfig>> {
    let (child_id, emotion) = parse_target(&child_id, &emotion)?;
    let key = format!("{}/{}", child_id, emotion.as_str());

    let config = state
        .assembler
        .run_query("get_threshold", move |db| db.get_threshold(&child_id, emotion))
        .await?
        .ok_or_else(|| Error::not_found("threshold", key))?;
    Ok(Json(config))
}

/// `PUT /thresholds/{child_id}/{emotion}`
pub async fn put(
    State(state): State<AppState>,
    Path((child_id, emotion)): Path<(String, String)>,
    payload: Result<Json<ThresholdUpdate>, JsonRejection>,
) -> ApiResult<Json<ThresholdConfig>> {
    let (child_id, emotion) = parse_target(&child_id, &emotion)?;
    let Json(update) = payload?;
    update.validate()?;

    let config = state
        .assembler
        .run_write("update_threshold", move |db| {
            db.update_threshold(&child_id, emotion, &update, Utc::now())
        })
        .await?;

    tracing::info!(
        child_id = %config.child_id,
        emotion = config.emotion.as_str(),
        threshold = config.threshold,
        hold_ms = config.hold_ms,
        "Updated evaluator threshold"
    );
    Ok(Json(config))
}
