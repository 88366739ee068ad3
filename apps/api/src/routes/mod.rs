pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::jobs::handlers as jobs;
use crate::render::handlers as render;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation
        .route("/api/generate", post(generation::handle_generate_stream))
        .route(
            "/api/generate/background",
            post(generation::handle_generate_background),
        )
        .route("/api/status/:job_id", get(jobs::handle_job_status))
        // Export
        .route("/api/download", post(render::handle_download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::app_state;

    const BOUNDARY: &str = "persona-test-boundary";

    fn multipart_request(uri: &str, form: &Value) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"formData\"\r\n\r\n\
             {form}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             Interview notes: invoices are always late.\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn valid_form() -> Value {
        json!({
            "productName": "Acme",
            "targetAudience": "freelance designers",
            "personaCount": 2,
            "websiteUrl": "https://acme.test"
        })
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(app_state(false))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "persona-api");
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let response = build_router(app_state(true))
            .oneshot(
                Request::get("/api/status/job_0_zzzzzz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Job not found", "code": "NOT_FOUND"})
        );
    }

    #[tokio::test]
    async fn test_generate_without_model_key_is_configuration_error() {
        let response = build_router(app_state(false))
            .oneshot(multipart_request("/api/generate", &valid_form()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "ANTHROPIC_API_KEY not configured");
    }

    #[tokio::test]
    async fn test_generate_rejects_missing_fields() {
        let response = build_router(app_state(true))
            .oneshot(multipart_request(
                "/api/generate",
                &json!({"productName": "Acme"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_generate_streams_progress_and_complete_events() {
        let response = build_router(app_state(true))
            .oneshot(multipart_request("/api/generate", &valid_form()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let text = String::from_utf8(body_bytes(response).await).unwrap();
        let events: Vec<Value> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim_start()).unwrap())
            .collect();

        assert_eq!(events[0], json!({"type": "progress", "step": "fetching", "progress": 10}));
        assert!(events.iter().any(|e| e["type"] == "content"));
        let complete = events.last().unwrap();
        assert_eq!(complete["type"], "complete");
        assert_eq!(complete["result"]["productName"], "Acme");
        assert_eq!(complete["result"]["personas"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_background_generation_completes_job() {
        let state = app_state(true);
        let response = build_router(state.clone())
            .oneshot(multipart_request("/api/generate/background", &valid_form()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "pending");
        let job_id = body["jobId"].as_str().unwrap().to_string();
        assert!(job_id.starts_with("job_"));

        let app = build_router(state);
        let mut progress = Vec::new();
        let mut status = Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/api/status/{job_id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            status = body_json(response).await;
            progress.push(status["progress"].as_u64().unwrap());
            if status["status"] == "completed" || status["status"] == "error" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(
            progress.windows(2).all(|w| w[0] <= w[1]),
            "progress went backwards: {progress:?}"
        );
        assert_eq!(progress.last(), Some(&100));
        assert_eq!(status["status"], "completed");
        assert_eq!(status["result"]["personas"][1]["type"], "The Planner");
    }

    #[tokio::test]
    async fn test_download_renders_pdf() {
        let request = Request::post("/api/download")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"personas": [{"type": "The Hustler"}], "productName": "Acme"}).to_string(),
            ))
            .unwrap();
        let response = build_router(app_state(false)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert!(body_bytes(response).await.starts_with(b"%PDF"));
    }
}
