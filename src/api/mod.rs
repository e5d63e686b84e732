//! HTTP API consumed by the ranch dashboard.
//!
//! ```text
//! GET  /api/health         unauthenticated liveness probe
//! GET  /api/history        filtered, paginated history
//! GET  /api/history/{id}   single record
//! GET  /api/summary        aggregate figures
//! POST /api/analyze        run vision analysis and record the result
//! GET  /voice              WebSocket voice relay
//! ```
//!
//! Everything under `/api` except health passes the rate limiter and the
//! API key check.

pub mod auth;
pub mod error;
pub mod rate_limit;
mod routes;
pub mod types;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::auth::{AuthState, api_key_middleware};
use crate::api::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::config::{Config, VoiceConfig};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::vision::{VisionProvider, create_vision_provider};

pub use error::ApiError;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<HistoryStore>,
    pub vision: Arc<dyn VisionProvider>,
    pub voice: Arc<VoiceConfig>,
    pub auth: AuthState,
    pub rate_limiter: RateLimiter,
    /// Decoded image size limit, also used as the body limit.
    pub request_limit_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl ApiState {
    /// Wire the store and the configured vision provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(HistoryStore::from_config(config));
        let vision = create_vision_provider(&config.vision)?;
        Ok(Self::new(config, store, vision))
    }

    pub fn new(config: &Config, store: Arc<HistoryStore>, vision: Arc<dyn VisionProvider>) -> Self {
        Self {
            store,
            vision,
            voice: Arc::new(config.voice.clone()),
            auth: AuthState {
                api_key: config.api_access_key.clone(),
            },
            rate_limiter: RateLimiter::new(&config.rate_limit),
            request_limit_bytes: config.request_limit_bytes(),
            cors_origins: config.cors_origins.clone(),
        }
    }
}

/// Build the full application router.
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/history", get(routes::list_history))
        .route("/history/{id}", get(routes::get_record))
        .route("/summary", get(routes::get_summary))
        .route("/analyze", post(routes::analyze))
        .route_layer(from_fn_with_state(state.auth.clone(), api_key_middleware))
        .route_layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        // Added after the layers, so unauthenticated.
        .route("/health", get(routes::health));

    let cors = cors_layer(&state.cors_origins);
    // Base64 inflates the image by 4/3; leave headroom for the JSON envelope.
    let body_limit =
        DefaultBodyLimit::max(state.request_limit_bytes.saturating_mul(4) / 3 + 64 * 1024);

    Router::new()
        .nest("/api", api)
        .route("/voice", get(crate::voice::voice_handler))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
