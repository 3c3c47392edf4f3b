use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, warn};
use tts_core::{ServiceConfig, SpeechEngine, TtsService, UnavailableEngine};

use server::config::ServerConfig;
use server::{build_router, spawn_cache_sweeper, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

#[cfg(feature = "piper")]
fn build_engine(config: &ServerConfig) -> Arc<dyn SpeechEngine> {
    info!("Loading TTS voices from {}", config.voice_map);
    match tts_core::piper::PiperEngine::from_mapfile(&config.voice_map) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            warn!("Could not load {}: {e}, synthesis disabled.", config.voice_map);
            Arc::new(UnavailableEngine::new(format!("voice map unavailable: {e}")))
        }
    }
}

#[cfg(not(feature = "piper"))]
fn build_engine(_config: &ServerConfig) -> Arc<dyn SpeechEngine> {
    warn!("Built without an engine backend (enable the `piper` feature), synthesis disabled.");
    Arc::new(UnavailableEngine::new("server built without an engine backend"))
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS server...");

    let config = ServerConfig::from_env();
    let service_config = ServiceConfig::from_env();

    let engine = build_engine(&config);
    let service = Arc::new(TtsService::new(engine, &service_config)?);
    info!(
        "Service configured: cache_capacity={}, cache_ttl={}s, monitor_window={}, voices={}",
        service_config.cache_capacity,
        service_config.cache_ttl_secs,
        service_config.monitor_window,
        service.voices().len()
    );

    if let Some(every) = config.cache_sweep_interval() {
        info!("Cache sweep every {}s", every.as_secs());
        spawn_cache_sweeper(Arc::clone(service.cache()), every);
    }

    let state = AppState::new(service);
    let app = build_router(state, &config);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
