//! Media probing endpoints.

use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use murmur::media::{probe, ToolError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    pub path: String,
}

/// GET /api/media/tracks?path=...
///
/// Audio track detection for a local media file, for picking which track
/// to transcribe.
pub async fn audio_tracks(
    State(state): State<AppState>,
    Query(query): Query<TracksQuery>,
) -> ApiResult<impl IntoResponse> {
    let ffprobe = state.config.tools.ffprobe.clone();
    let media = PathBuf::from(query.path);

    // The probe is a blocking subprocess call.
    let result = tokio::task::spawn_blocking(move || probe::audio_tracks(&ffprobe, &media))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match result {
        Ok(tracks) => Ok(Json(tracks)),
        Err(ToolError::MissingFile(_)) => Err(ApiError::NotFound { entity: "File" }),
        Err(e) => {
            tracing::warn!(error = %e, "Audio track probe failed");
            Err(ApiError::BadRequest("Failed to analyze file".to_string()))
        }
    }
}
