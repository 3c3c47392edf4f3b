//! Caching and performance monitoring for a neural text-to-speech service.
//!
//! A [`TtsService`] derives a fingerprint for every request
//! ([`KeyDeriver`]), serves repeats from a bounded LRU + TTL
//! [`ResultCache`], calls the [`SpeechEngine`] only on a miss, and records
//! each successful request's real-time factor in a rolling
//! [`PerformanceMonitor`].

pub mod audio;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod monitor;
#[cfg(feature = "piper")]
pub mod piper;
pub mod service;

pub use audio::{AudioBuffer, PostProcessor};
pub use cache::{CacheStats, Payload, ResultCache};
pub use config::ServiceConfig;
pub use engine::{SpeechEngine, UnavailableEngine};
pub use error::{ConfigError, SynthesisError};
pub use keys::{KeyDeriver, ParamValue, SynthesisParams};
pub use monitor::{Grade, MetricSample, PerformanceMonitor, PerformanceSnapshot};
pub use service::{SynthesisOutcome, SynthesisRequest, TtsService};
