//! Route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod events;
pub mod jobs;
pub mod media;
pub mod meta;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(meta::health))
        .route("/api/config", get(meta::submission_options))
        .route("/api/jobs", post(jobs::submit).get(jobs::list))
        .route("/api/jobs/clear", post(jobs::clear))
        .route("/api/jobs/{id}", get(jobs::get_one).delete(jobs::delete))
        .route("/api/jobs/{id}/logs", get(jobs::logs))
        .route("/api/jobs/{id}/cancel", post(jobs::cancel))
        .route("/api/jobs/{id}/restart", post(jobs::restart))
        .route("/api/events", get(events::subscribe))
        .route("/api/media/tracks", get(media::audio_tracks))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use murmur::config::MurmurConfig;

    fn test_state(dir: &std::path::Path) -> AppState {
        let mut config = MurmurConfig::default();
        config.directories.download_dir = dir.join("downloads");
        config.directories.upload_dir = dir.join("uploads");
        config.directories.data_dir = dir.join("data");
        config.directories.job_log_dir = dir.join("logs");
        AppState::in_memory(config)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_without_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/jobs",
                json!({"jobType": "transcribe", "parameters": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_submit_returns_queued_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"x").unwrap();
        let state = test_state(dir.path());
        let app = router(state.clone());

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/jobs",
                json!({
                    "jobType": "transcribe",
                    "parameters": {"source": media.display().to_string()}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "queued");
        let job_id = body["jobId"].as_str().unwrap().to_string();

        // The record is queryable right away.
        let response = router(state)
            .oneshot(
                Request::get(format!("/api/jobs/{}", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], job_id.as_str());
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::get("/api/jobs/no-such-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_missing_job_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::delete("/api/jobs/no-such-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deleted"], 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::post("/api/jobs/no-such-id/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_with_bad_status_filter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::get("/api/jobs?status=exploded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_with_default_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(json_request(Method::POST, "/api/jobs/clear", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deleted"], 0);
    }

    #[tokio::test]
    async fn test_clear_rejects_unknown_status() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/jobs/clear",
                json!({"statuses": ["exploded"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submission_options_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["models"].as_array().unwrap().len() >= 4);
        assert!(body["languages"].as_array().unwrap().len() >= 10);
    }
}
