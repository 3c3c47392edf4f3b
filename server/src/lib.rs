pub mod config;
pub mod error;
pub mod routes;
pub mod validation;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tts_core::{ResultCache, TtsService};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TtsService>,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<TtsService>) -> Self {
        Self {
            service,
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = header.clone() {
        request.headers_mut().insert("x-request-id", value);
    }
    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        base.allow_origin(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
    }
}

/// All routes, mounted both at the root and under `/api`.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config))
        .into_inner();

    let api = Router::new()
        .route("/health", get(routes::health_check))
        .route("/healthz", get(routes::health_check))
        .route("/voices", get(routes::list_voices))
        .route("/tts", post(routes::tts_endpoint))
        .route("/stats/cache", get(routes::cache_stats))
        .route("/cache/clear", post(routes::clear_cache))
        .route("/stats/performance", get(routes::performance_snapshot))
        .route("/stats/performance/trend", get(routes::performance_trend))
        .route("/stats/performance/reset", post(routes::reset_performance))
        .route("/metrics", get(routes::metrics_endpoint));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}

/// Periodically drop expired cache entries so memory isn't held until the
/// next read of each key.
pub fn spawn_cache_sweeper(cache: Arc<ResultCache>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(purged, "cache sweep");
            }
        }
    })
}
