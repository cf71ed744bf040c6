//! Handlers for the `/api/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use murmur::job::{JobPatch, JobStatus, NewJobRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Strict status parsing for filters: unknown names are a client error,
/// not a silent default.
fn parse_status(name: &str) -> ApiResult<JobStatus> {
    match name.trim() {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(ApiError::BadRequest(format!(
            "unknown status '{}'",
            other
        ))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// POST /api/jobs
///
/// Submit a new job. Returns 201 with `{jobId, status: queued}` as soon
/// as the ledger row exists and dispatch has been handed off — never
/// waits for the handler.
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<NewJobRequest>,
) -> ApiResult<impl IntoResponse> {
    let job = state.executor.submit(request)?;

    tracing::info!(job_id = %job.id, job_type = %job.job_type, "Job submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated status set, e.g. `?status=queued,running`.
    pub status: Option<String>,
}

/// GET /api/jobs
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let statuses = match query.status.as_deref() {
        Some(raw) => raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .collect::<ApiResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    let jobs = state.ledger.list(&statuses)?;
    Ok(Json(jobs))
}

/// GET /api/jobs/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.ledger.get(&id)? {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::NotFound { entity: "Job" }),
    }
}

/// GET /api/jobs/{id}/logs
///
/// The job's dedicated log file. Missing means not produced yet.
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = state.config.directories.job_log_path(&id);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Json(json!({
            "jobId": id,
            "logs": content,
            "size": content.len(),
        }))),
        Err(_) => Err(ApiError::NotFound { entity: "Log file" }),
    }
}

/// POST /api/jobs/{id}/cancel
///
/// Sets the cancellation flag and returns immediately; the worker
/// observes it at its next checkpoint.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.executor.cancel(&id) {
        return Ok(Json(json!({"status": "cancelling"})));
    }

    // No live token: either the job is unknown, already terminal, or a
    // leftover row from a previous process with no worker behind it.
    match state.ledger.get(&id)? {
        None => Err(ApiError::NotFound { entity: "Job" }),
        Some(job) if job.status.is_terminal() => Err(ApiError::Conflict(format!(
            "Cannot cancel job with status {}",
            job.status
        ))),
        Some(job) => {
            state.ledger.update(&job.id, JobPatch::cancelled());
            Ok(Json(json!({"status": "cancelling"})))
        }
    }
}

/// POST /api/jobs/{id}/restart
///
/// Always a brand-new job with the same parameters, never a resume.
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.executor.restart(&id)? {
        Some(job) => Ok((
            StatusCode::CREATED,
            Json(SubmitResponse {
                job_id: job.id,
                status: job.status,
            }),
        )),
        None => Err(ApiError::NotFound { entity: "Job" }),
    }
}

/// DELETE /api/jobs/{id}
///
/// Idempotent: a missing id reports zero removed, not an error.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.ledger.delete(&id)?;
    Ok(Json(json!({"deleted": deleted})))
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default = "default_clear_statuses")]
    pub statuses: Vec<String>,
}

fn default_clear_statuses() -> Vec<String> {
    vec!["completed".to_string(), "failed".to_string()]
}

/// POST /api/jobs/clear
pub async fn clear(
    State(state): State<AppState>,
    Json(request): Json<ClearRequest>,
) -> ApiResult<impl IntoResponse> {
    let statuses = request
        .statuses
        .iter()
        .map(|s| parse_status(s))
        .collect::<ApiResult<Vec<_>>>()?;

    let deleted = state.ledger.delete_where(&statuses)?;
    Ok(Json(json!({"deleted": deleted})))
}
