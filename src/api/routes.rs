//! Handlers for the `/api` routes.

use axum::Json;
use axum::extract::{Path, Query, State};

use crate::api::ApiState;
use crate::api::error::ApiError;
use crate::api::types::{AnalyzeRequest, HealthResponse, HistoryParams};
use crate::api::validation::{is_valid_base64, normalize_base64};
use crate::history::{AnalysisRecord, HistoryPage, HistorySummary};

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub(crate) async fn list_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = state.store.query(&params.into_query()).await?;
    Ok(Json(page))
}

pub(crate) async fn get_record(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    state
        .store
        .find(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Record not found.".to_string()))
}

pub(crate) async fn get_summary(
    State(state): State<ApiState>,
) -> Result<Json<HistorySummary>, ApiError> {
    Ok(Json(state.store.summary().await?))
}

/// Validate the image, run the provider, and prepend the result.
///
/// Nothing is recorded if the provider call fails.
pub(crate) async fn analyze(
    State(state): State<ApiState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    let image = normalize_base64(req.base64_image.as_deref())
        .ok_or_else(|| ApiError::BadRequest("Image not provided.".to_string()))?;

    if !is_valid_base64(image, state.request_limit_bytes) {
        return Err(ApiError::BadRequest(
            "Invalid or oversized image.".to_string(),
        ));
    }

    let camera_id = req.camera_id.filter(|c| !c.is_empty());

    let analysis = state.vision.analyze(image).await.map_err(|e| {
        tracing::warn!(
            provider = state.vision.name(),
            camera_id = ?camera_id,
            error = %e,
            "Vision analysis failed"
        );
        ApiError::BadGateway("Image analysis failed.".to_string())
    })?;

    let record = analysis.into_record(camera_id);
    state.store.append(record.clone()).await?;

    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    use crate::api::router;
    use crate::config::{Config, RateLimitConfig};
    use crate::error::VisionError;
    use crate::history::{HistoryState, HistoryStore};
    use crate::vision::{ProviderAnalysis, StubVisionProvider, VisionProvider};

    use super::*;

    /// Provider that always fails, to check nothing gets recorded.
    struct FailingVision;

    #[async_trait::async_trait]
    impl VisionProvider for FailingVision {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _image: &str) -> Result<ProviderAnalysis, VisionError> {
            Err(VisionError::RequestFailed {
                provider: "failing".into(),
                reason: "upstream down".into(),
            })
        }
    }

    struct Harness {
        _dir: TempDir,
        state: ApiState,
    }

    fn harness_with(config: Config, vision: Arc<dyn VisionProvider>) -> Harness {
        let dir = tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(
            dir.path().join("history.json"),
            config.history_max,
        ));
        Harness {
            _dir: dir,
            state: ApiState::new(&config, store, vision),
        }
    }

    fn harness() -> Harness {
        harness_with(Config::default(), Arc::new(StubVisionProvider))
    }

    async fn send(state: &ApiState, req: Request<Body>) -> Response {
        router(state.clone()).oneshot(req).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness();
        let resp = send(&h.state, get("/api/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn history_serves_seed_on_first_access() {
        let h = harness();
        let resp = send(&h.state, get("/api/history")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json_body(resp).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["limit"], 200);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["history"][0]["id"], "seed-3");
    }

    #[tokio::test]
    async fn history_filters_by_camera() {
        let h = harness();
        let resp = send(&h.state, get("/api/history?cameraId=cam-01&limit=1")).await;
        let body = json_body(resp).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
        assert_eq!(body["history"][0]["cameraId"], "cam-01");
    }

    #[tokio::test]
    async fn record_lookup_and_not_found() {
        let h = harness();

        let resp = send(&h.state, get("/api/history/seed-2")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["healthScore"], 88);

        let resp = send(&h.state, get("/api/history/nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["message"], "Record not found.");
    }

    #[tokio::test]
    async fn summary_reflects_store() {
        let h = harness();
        h.state
            .store
            .write(&HistoryState::new(vec![
                AnalysisRecord {
                    health_score: 90,
                    ..AnalysisRecord::new(None)
                },
                AnalysisRecord {
                    health_score: 40,
                    ..AnalysisRecord::new(None)
                },
                AnalysisRecord {
                    health_score: 70,
                    ..AnalysisRecord::new(None)
                },
            ]))
            .await
            .unwrap();

        let body = json_body(send(&h.state, get("/api/summary")).await).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["avgScore"], 67);
        assert_eq!(body["critical"], 1);
        assert!(body["lastUpdate"].is_string());
    }

    #[tokio::test]
    async fn analyze_records_result_newest_first() {
        let h = harness();
        let resp = send(
            &h.state,
            post_json(
                "/api/analyze",
                json!({ "base64Image": "data:image/jpeg;base64,QUJDRA==", "cameraId": "cam-09" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let record = json_body(resp).await;
        assert_eq!(record["cameraId"], "cam-09");
        assert!(record["id"].as_str().is_some_and(|id| !id.is_empty()));

        let state = h.state.store.read().await.unwrap();
        assert_eq!(state.len(), 4);
        assert_eq!(state.history[0].id, record["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn analyze_rejects_missing_and_invalid_images() {
        let h = harness();

        let resp = send(&h.state, post_json("/api/analyze", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "Image not provided.");

        let resp = send(
            &h.state,
            post_json("/api/analyze", json!({ "base64Image": "not base64 !!" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "Invalid or oversized image.");

        let resp = send(
            &h.state,
            post_json("/api/analyze", json!({ "base64Image": "QU=JD" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.state.store.read().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn analyze_provider_failure_leaves_store_untouched() {
        let h = harness_with(Config::default(), Arc::new(FailingVision));
        let before = h.state.store.read().await.unwrap();

        let resp = send(
            &h.state,
            post_json("/api/analyze", json!({ "base64Image": "QUJDRA==" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(h.state.store.read().await.unwrap(), before);
    }

    #[tokio::test]
    async fn api_key_required_when_configured() {
        let config = Config {
            api_access_key: Some(SecretString::from("ranch-key")),
            ..Config::default()
        };
        let h = harness_with(config, Arc::new(StubVisionProvider));

        let resp = send(&h.state, get("/api/summary")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/api/summary")
            .header("x-api-key", "ranch-key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&h.state, req).await.status(), StatusCode::OK);

        // Health stays open.
        assert_eq!(
            send(&h.state, get("/api/health")).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn rate_limit_returns_429_with_headers() {
        let config = Config {
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 2,
            },
            ..Config::default()
        };
        let h = harness_with(config, Arc::new(StubVisionProvider));

        let first = send(&h.state, get("/api/summary")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "2");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "1");
        assert!(first.headers().contains_key("x-ratelimit-reset"));

        send(&h.state, get("/api/summary")).await;
        let third = send(&h.state, get("/api/summary")).await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(third.headers()["x-ratelimit-remaining"], "0");
    }
}
