//! Guardian-facing child report.

use axum::extract::{Path, State};
use axum::Json;
use practiscope_core::analytics::ChildReport;

use super::error::ApiResult;
use super::AppState;

/// `GET /children/{child_id}/report`
pub async fn report(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
) -> ApiResult<Json<ChildReport>> {
    let report = state.assembler.child_report(&child_id).await?;
    Ok(Json(report))
}
