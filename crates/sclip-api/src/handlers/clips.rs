//! Clip handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use sclip_models::{Clip, ClipId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::jobs::is_valid_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClipListResponse {
    pub clips: Vec<Clip>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteClipResponse {
    pub deleted: bool,
}

fn parse_clip_id(raw: &str) -> ApiResult<ClipId> {
    if !is_valid_id(raw) {
        return Err(ApiError::not_found(format!("Clip not found: {}", raw)));
    }
    Ok(ClipId::from_string(raw))
}

/// GET /api/clips
pub async fn list_clips(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ClipListResponse>> {
    let clips = state.orchestrator.list_clips(&user.account_id).await?;
    Ok(Json(ClipListResponse {
        total: clips.len(),
        clips,
    }))
}

/// GET /api/clips/:clip_id
pub async fn get_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<Clip>> {
    let clip_id = parse_clip_id(&clip_id)?;
    Ok(Json(state.orchestrator.clip(&user.account_id, &clip_id).await?))
}

/// DELETE /api/clips/:clip_id
pub async fn delete_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<DeleteClipResponse>> {
    let clip_id = parse_clip_id(&clip_id)?;
    state.orchestrator.delete_clip(&user.account_id, &clip_id).await?;
    Ok(Json(DeleteClipResponse { deleted: true }))
}
