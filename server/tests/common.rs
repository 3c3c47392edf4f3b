//! Common utilities for integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use server::config::ServerConfig;
use server::{build_router, AppState};
use tts_core::{
    AudioBuffer, PerformanceMonitor, PostProcessor, ResultCache, SpeechEngine, SynthesisError,
    SynthesisParams, TtsService,
};

pub const SAMPLE_RATE: u32 = 16_000;

/// Produces 50 ms of tone per character; fails for voice "broken".
#[derive(Default)]
pub struct ToneEngine {
    pub calls: AtomicUsize,
}

impl SpeechEngine for ToneEngine {
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        _params: &SynthesisParams,
    ) -> Result<AudioBuffer, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if voice == "broken" {
            return Err(SynthesisError::Unavailable("voice model failed to load".into()));
        }
        if !self.voices().iter().any(|v| v == voice) {
            return Err(SynthesisError::UnknownVoice(voice.to_string()));
        }
        let len = text.chars().count() * SAMPLE_RATE as usize / 20;
        let samples = (0..len).map(|i| (i as f32 * 0.03).sin() * 0.4).collect();
        Ok(AudioBuffer::new(samples, SAMPLE_RATE))
    }

    fn voices(&self) -> Vec<String> {
        vec!["de_DE".to_string(), "en_US".to_string()]
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<ToneEngine>,
    pub service: Arc<TtsService>,
}

/// Create a test app instance
pub fn create_test_app() -> TestApp {
    let engine = Arc::new(ToneEngine::default());
    let service = Arc::new(TtsService::with_components(
        engine.clone(),
        Arc::new(ResultCache::new(16, Duration::from_secs(300)).unwrap()),
        Arc::new(PerformanceMonitor::new(10).unwrap()),
        PostProcessor::default(),
        Duration::from_secs(10),
    ));
    let router = build_router(AppState::new(service.clone()), &ServerConfig::default());
    TestApp {
        router,
        engine,
        service,
    }
}
