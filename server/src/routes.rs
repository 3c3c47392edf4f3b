use std::sync::atomic::Ordering;

use axum::{extract::State, Json};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use tts_core::{CacheStats, PerformanceSnapshot, SynthesisRequest};

use crate::error::ApiError;
use crate::validation::validate_tts_request;
use crate::AppState;

#[derive(Serialize)]
pub struct TtsResponse {
    pub audio_base64: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub voice: String,
    pub cached: bool,
    pub rtf: f64,
    pub fingerprint: String,
}

#[derive(Serialize)]
pub struct TrendResponse {
    pub window_capacity: usize,
    pub rtf: Vec<f64>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub request_count: u64,
    pub cache: CacheStats,
    pub performance: PerformanceSnapshot,
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.voices())
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_tts_request(&req.text, req.voice.as_deref(), &req.params)?;

    let outcome = state.service.synthesize(&req).await?;

    Ok(Json(TtsResponse {
        audio_base64: base64::engine::general_purpose::STANDARD.encode(&outcome.audio),
        duration_ms: outcome.duration.as_millis() as u64,
        sample_rate: outcome.sample_rate,
        voice: outcome.voice,
        cached: outcome.cache_hit,
        rtf: outcome.rtf,
        fingerprint: outcome.fingerprint,
    }))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service.cache().stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.service.cache().clear();
    info!(removed, "response cache cleared");
    Json(ClearResponse { removed })
}

pub async fn performance_snapshot(State(state): State<AppState>) -> Json<PerformanceSnapshot> {
    Json(state.service.monitor().snapshot())
}

pub async fn performance_trend(State(state): State<AppState>) -> Json<TrendResponse> {
    let monitor = state.service.monitor();
    Json(TrendResponse {
        window_capacity: monitor.window_capacity(),
        rtf: monitor.trend(),
    })
}

pub async fn reset_performance(State(state): State<AppState>) -> Json<PerformanceSnapshot> {
    let monitor = state.service.monitor();
    monitor.reset();
    info!("performance window reset");
    Json(monitor.snapshot())
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        request_count: state.request_count.load(Ordering::Relaxed),
        cache: state.service.cache().stats(),
        performance: state.service.monitor().snapshot(),
    })
}
