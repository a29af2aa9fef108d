//! Job handlers: trigger, poll, list and delete.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use sclip_models::{Clip, Job, JobId, JobStatus};
use sclip_worker::JobSummary;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Longest accepted source locator.
pub const MAX_LOCATOR_LENGTH: usize = 500;

// ============================================================================
// Types
// ============================================================================

/// Request to create a job.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[serde(default, alias = "video_url")]
    #[validate(length(max = 500, message = "Video URL is too long"))]
    pub source_locator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Poll response; `clips` stay empty until the job completes.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub clips_count: usize,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: Job,
    pub clips_count: u32,
}

impl From<JobSummary> for JobResponse {
    fn from(summary: JobSummary) -> Self {
        Self {
            job: summary.job,
            clips_count: summary.clips_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: Job,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Serialize)]
pub struct DeleteJobResponse {
    pub deleted: bool,
}

/// Ids are UUIDs; anything else cannot name a job.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    if !is_valid_id(raw) {
        return Err(ApiError::not_found(format!("Job not found: {}", raw)));
    }
    Ok(JobId::from_string(raw))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/jobs
///
/// Returns:
/// - 202: job admitted in `queued`
/// - 400: malformed body, missing or unsupported locator
/// - 429: weekly quota reached
pub async fn create_job(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(request) = payload?;
    request.validate()?;

    let locator = request
        .source_locator
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Video URL is required"))?;

    let account = state.accounts.get_or_create(&user).await?;
    let job = state.orchestrator.submit(&account.id, locator).await?;

    info!(account_id = %account.id, job_id = %job.id, "Job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: job.id.to_string(),
            status: job.status,
        }),
    ))
}

/// GET /api/jobs/:job_id/status
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<JobStatusResponse>> {
    let job_id = parse_job_id(&job_id)?;
    let view = state.orchestrator.status(&user.account_id, &job_id).await?;

    Ok(Json(JobStatusResponse {
        job_id: view.job.id.to_string(),
        status: view.job.status,
        title: view.job.title,
        created_at: view.job.created_at,
        error_message: view.job.error_message,
        clips_count: view.clips.len(),
        clips: view.clips,
    }))
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<JobListResponse>> {
    let jobs: Vec<JobResponse> = state
        .orchestrator
        .list_jobs(&user.account_id)
        .await?
        .into_iter()
        .map(JobResponse::from)
        .collect();

    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs,
    }))
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<JobDetailResponse>> {
    let job_id = parse_job_id(&job_id)?;
    let view = state.orchestrator.job(&user.account_id, &job_id).await?;
    Ok(Json(JobDetailResponse {
        job: view.job,
        clips: view.clips,
    }))
}

/// DELETE /api/jobs/:job_id
///
/// Always 200; `deleted` says whether a record was removed.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<DeleteJobResponse>> {
    let deleted = match parse_job_id(&job_id) {
        Ok(job_id) => state.orchestrator.delete_job(&user.account_id, &job_id).await?,
        Err(_) => false,
    };
    Ok(Json(DeleteJobResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id(&"a".repeat(65)));
    }

    #[test]
    fn test_request_accepts_alias_and_limits_length() {
        let request: CreateJobRequest =
            serde_json::from_str(r#"{"video_url": "https://youtu.be/abc"}"#).unwrap();
        assert_eq!(request.source_locator.as_deref(), Some("https://youtu.be/abc"));
        assert!(request.validate().is_ok());

        let request = CreateJobRequest {
            source_locator: Some("x".repeat(MAX_LOCATOR_LENGTH + 1)),
        };
        assert!(request.validate().is_err());
    }
}
