//! Request orchestration: fingerprint -> cache -> engine -> cache -> monitor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::audio::{encode_wav, wav_duration, PostProcessor};
use crate::cache::{Payload, ResultCache};
use crate::config::ServiceConfig;
use crate::engine::SpeechEngine;
use crate::error::{ConfigError, SynthesisError};
use crate::keys::{KeyDeriver, SynthesisParams};
use crate::monitor::PerformanceMonitor;

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub params: SynthesisParams,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            params: SynthesisParams::new(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<crate::keys::ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// A successful synthesis, fresh or served from cache.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    /// 16-bit PCM mono WAV.
    pub audio: Payload,
    pub sample_rate: u32,
    pub duration: Duration,
    pub cache_hit: bool,
    pub fingerprint: String,
    pub voice: String,
    pub elapsed: Duration,
    pub rtf: f64,
}

/// Ties one engine to one cache and one monitor.
///
/// Cheap to share behind an `Arc`; all interior state is synchronised.
pub struct TtsService {
    engine: Arc<dyn SpeechEngine>,
    cache: Arc<ResultCache>,
    monitor: Arc<PerformanceMonitor>,
    keys: KeyDeriver,
    post_processor: PostProcessor,
    timeout: Duration,
}

impl std::fmt::Debug for TtsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsService")
            .field("engine", &"<SpeechEngine>")
            .field("cache", &self.cache)
            .field("monitor", &self.monitor)
            .field("post_processor", &self.post_processor)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TtsService {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: &ServiceConfig) -> Result<Self, ConfigError> {
        let cache = Arc::new(ResultCache::new(config.cache_capacity, config.cache_ttl())?);
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor_window)?);
        Ok(Self::with_components(
            engine,
            cache,
            monitor,
            config.post_processor.clone(),
            config.synthesis_timeout(),
        ))
    }

    /// Assemble from existing components, e.g. a cache shared between services.
    pub fn with_components(
        engine: Arc<dyn SpeechEngine>,
        cache: Arc<ResultCache>,
        monitor: Arc<PerformanceMonitor>,
        post_processor: PostProcessor,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            cache,
            monitor,
            keys: KeyDeriver::new(),
            post_processor,
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn voices(&self) -> Vec<String> {
        let mut voices = self.engine.voices();
        voices.sort();
        voices
    }

    /// The requested voice, or the engine's default when none is named.
    pub fn resolve_voice(&self, voice: Option<&str>) -> Result<String, SynthesisError> {
        match voice {
            Some(v) => Ok(v.to_string()),
            None => self
                .engine
                .default_voice()
                .ok_or_else(|| SynthesisError::Unavailable("no voices configured".to_string())),
        }
    }

    pub async fn synthesize(&self, req: &SynthesisRequest) -> Result<SynthesisOutcome, SynthesisError> {
        let started = Instant::now();

        if req.text.trim().is_empty() {
            return Err(SynthesisError::InvalidInput("text cannot be empty".to_string()));
        }
        let voice = self.resolve_voice(req.voice.as_deref())?;
        let fingerprint = self.keys.derive(&req.text, &voice, &req.params);

        // Entries whose WAV header won't decode are purged and count as misses.
        if let Some((payload, (duration, sample_rate))) =
            self.cache.get_decoded(&fingerprint, wav_duration)
        {
            let elapsed = started.elapsed();
            let rtf = real_time_factor(elapsed, duration);
            self.monitor.record(rtf, as_millis_f64(elapsed), duration.as_secs_f64());
            debug!(%fingerprint, %voice, rtf, "cache hit");
            return Ok(SynthesisOutcome {
                audio: payload,
                sample_rate,
                duration,
                cache_hit: true,
                fingerprint,
                voice,
                elapsed,
                rtf,
            });
        }

        // Cache miss - synthesize, post-process and encode in a single blocking task
        let engine = Arc::clone(&self.engine);
        let post_processor = self.post_processor.clone();
        let text = req.text.clone();
        let engine_voice = voice.clone();
        let params = req.params.clone();
        let task = tokio::task::spawn_blocking(move || {
            let audio = engine.synthesize(&text, &engine_voice, &params)?;
            let audio = post_processor.apply(audio);
            if audio.samples.is_empty() || audio.sample_rate == 0 {
                return Err(SynthesisError::Engine(anyhow::anyhow!("engine produced no audio")));
            }
            let wav = encode_wav(&audio.samples, audio.sample_rate)?;
            Ok::<_, SynthesisError>((wav, audio.sample_rate, audio.duration()))
        });

        let (wav, sample_rate, duration) = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(SynthesisError::Engine(anyhow::anyhow!(
                    "synthesis task failed: {join_err}"
                )));
            }
            Err(_) => {
                warn!(%fingerprint, timeout_secs = self.timeout.as_secs_f64(), "synthesis timed out");
                return Err(SynthesisError::Timeout(self.timeout));
            }
        };

        let payload: Payload = wav.into();
        self.cache.put(fingerprint.clone(), payload.clone());

        let elapsed = started.elapsed();
        let rtf = real_time_factor(elapsed, duration);
        self.monitor.record(rtf, as_millis_f64(elapsed), duration.as_secs_f64());
        debug!(
            %fingerprint,
            %voice,
            rtf,
            audio_ms = duration.as_millis() as u64,
            "synthesized"
        );

        Ok(SynthesisOutcome {
            audio: payload,
            sample_rate,
            duration,
            cache_hit: false,
            fingerprint,
            voice,
            elapsed,
            rtf,
        })
    }
}

/// Generation time over audio time; 0.0 for empty audio.
pub fn real_time_factor(elapsed: Duration, audio: Duration) -> f64 {
    let audio_s = audio.as_secs_f64();
    if audio_s <= 0.0 {
        0.0
    } else {
        elapsed.as_secs_f64() / audio_s
    }
}

fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_time_factor() {
        assert_eq!(
            real_time_factor(Duration::from_millis(500), Duration::from_secs(2)),
            0.25
        );
        assert_eq!(real_time_factor(Duration::from_secs(1), Duration::ZERO), 0.0);
    }

    #[test]
    fn test_request_builder() {
        let req = SynthesisRequest::new("hi")
            .with_voice("en_US")
            .with_param("speed", 1.25);
        assert_eq!(req.voice.as_deref(), Some("en_US"));
        assert_eq!(req.params.len(), 1);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: SynthesisRequest = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(req.text, "hello");
        assert!(req.voice.is_none());
        assert!(req.params.is_empty());
    }
}
