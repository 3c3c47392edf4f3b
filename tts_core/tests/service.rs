//! Orchestrator behaviour against a scripted engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tts_core::{
    AudioBuffer, KeyDeriver, PerformanceMonitor, PostProcessor, ResultCache, ServiceConfig,
    SpeechEngine, SynthesisError, SynthesisParams, SynthesisRequest, TtsService,
};

const SAMPLE_RATE: u32 = 16_000;

#[derive(Default)]
struct FakeEngine {
    calls: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
}

impl FakeEngine {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechEngine for FakeEngine {
    fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        _params: &SynthesisParams,
    ) -> Result<AudioBuffer, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(SynthesisError::ResourceExhausted("out of memory".into()));
        }
        // 100 ms of tone per character
        let len = text.chars().count() * SAMPLE_RATE as usize / 10;
        let samples = (0..len)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        Ok(AudioBuffer::new(samples, SAMPLE_RATE))
    }

    fn voices(&self) -> Vec<String> {
        vec!["en_US".to_string(), "de_DE".to_string()]
    }
}

struct Harness {
    engine: Arc<FakeEngine>,
    service: TtsService,
}

fn harness(engine: FakeEngine, timeout: Duration) -> Harness {
    let engine = Arc::new(engine);
    let cache = Arc::new(ResultCache::new(8, Duration::from_secs(60)).unwrap());
    let monitor = Arc::new(PerformanceMonitor::new(20).unwrap());
    let service = TtsService::with_components(
        engine.clone(),
        cache,
        monitor,
        PostProcessor::default(),
        timeout,
    );
    Harness { engine, service }
}

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let h = harness(FakeEngine::default(), Duration::from_secs(5));

    let first = h
        .service
        .synthesize(&SynthesisRequest::new("Hello there").with_voice("en_US"))
        .await
        .unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.sample_rate, SAMPLE_RATE);
    assert_eq!(first.duration, Duration::from_millis(1_100));

    // Case and surrounding whitespace fold into the same fingerprint.
    let second = h
        .service
        .synthesize(&SynthesisRequest::new("  hello THERE ").with_voice("en_US"))
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(&second.audio[..], &first.audio[..]);
    assert_eq!(second.duration, first.duration);

    assert_eq!(h.engine.calls(), 1);

    let stats = h.service.cache().stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));

    let snap = h.service.monitor().snapshot();
    assert_eq!(snap.total_requests, 2);
    assert_eq!(h.service.monitor().trend().len(), 2);
}

#[tokio::test]
async fn test_params_and_voice_split_entries() {
    let h = harness(FakeEngine::default(), Duration::from_secs(5));
    let base = SynthesisRequest::new("abc").with_voice("en_US");

    h.service.synthesize(&base).await.unwrap();
    h.service
        .synthesize(&base.clone().with_param("speed", 1.5))
        .await
        .unwrap();
    h.service
        .synthesize(&SynthesisRequest::new("abc").with_voice("de_DE"))
        .await
        .unwrap();

    assert_eq!(h.engine.calls(), 3);
    assert_eq!(h.service.cache().len(), 3);
}

#[tokio::test]
async fn test_default_voice_used_when_unspecified() {
    let h = harness(FakeEngine::default(), Duration::from_secs(5));
    let out = h.service.synthesize(&SynthesisRequest::new("hi")).await.unwrap();
    assert_eq!(out.voice, "en_US");
    assert_eq!(h.service.voices(), vec!["de_DE".to_string(), "en_US".to_string()]);
}

#[tokio::test]
async fn test_failures_are_neither_cached_nor_sampled() {
    let h = harness(
        FakeEngine {
            fail: true,
            ..Default::default()
        },
        Duration::from_secs(5),
    );

    for _ in 0..3 {
        let err = h
            .service
            .synthesize(&SynthesisRequest::new("doomed"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ResourceExhausted(_)));
    }

    assert_eq!(h.engine.calls(), 3);
    assert!(h.service.cache().is_empty());
    assert_eq!(h.service.monitor().snapshot().total_requests, 0);
}

#[tokio::test]
async fn test_slow_engine_times_out() {
    let h = harness(
        FakeEngine {
            delay: Some(Duration::from_millis(300)),
            ..Default::default()
        },
        Duration::from_millis(20),
    );

    let err = h
        .service
        .synthesize(&SynthesisRequest::new("slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Timeout(_)));
    assert!(h.service.cache().is_empty());
    assert_eq!(h.service.monitor().snapshot().total_requests, 0);
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let h = harness(FakeEngine::default(), Duration::from_secs(5));
    let err = h
        .service
        .synthesize(&SynthesisRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::InvalidInput(_)));
    assert_eq!(h.engine.calls(), 0);
    assert_eq!(h.service.cache().stats().misses, 0);
}

#[tokio::test]
async fn test_corrupt_entry_purged_and_resynthesized() {
    let h = harness(FakeEngine::default(), Duration::from_secs(5));
    let fingerprint = KeyDeriver::new().derive("broken", "en_US", &SynthesisParams::new());
    h.service.cache().put(fingerprint.clone(), b"not a wav".to_vec());

    let out = h
        .service
        .synthesize(&SynthesisRequest::new("broken").with_voice("en_US"))
        .await
        .unwrap();
    assert!(!out.cache_hit);
    assert_eq!(out.fingerprint, fingerprint);
    assert_eq!(h.engine.calls(), 1);

    // The bad entry was a miss, not a hit.
    let stats = h.service.cache().stats();
    assert_eq!((stats.hits, stats.misses), (0, 1));
    assert_eq!(stats.hit_rate, 0.0);

    // The replacement decodes, so the next call is a hit.
    let again = h
        .service
        .synthesize(&SynthesisRequest::new("broken").with_voice("en_US"))
        .await
        .unwrap();
    assert!(again.cache_hit);
    assert_eq!(h.service.monitor().snapshot().total_requests, 2);
    assert_eq!(h.service.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_service_from_config_rejects_zero_capacity() {
    let config = ServiceConfig {
        cache_capacity: 0,
        ..ServiceConfig::default()
    };
    let engine: Arc<dyn SpeechEngine> = Arc::new(FakeEngine::default());
    assert!(TtsService::new(engine, &config).is_err());
}
