use std::time::Duration;

use thiserror::Error;

/// Construction-time contract violations. Components refuse to build
/// rather than run with undefined bounds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache capacity must be greater than 0")]
    ZeroCapacity,

    #[error("cache ttl must be greater than 0")]
    ZeroTtl,

    #[error("monitor window must hold at least one sample")]
    ZeroWindow,
}

/// Failures of the external synthesis engine (or of encoding its output).
///
/// These are handed back to the caller unchanged. A failed synthesis is
/// never cached and never recorded as a performance sample.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("synthesis engine unavailable: {0}")]
    Unavailable(String),

    #[error("synthesis resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("audio encoding error: {0}")]
    Encoding(String),

    #[error("engine error: {0}")]
    Engine(#[from] anyhow::Error),
}

impl From<hound::Error> for SynthesisError {
    fn from(e: hound::Error) -> Self {
        SynthesisError::Encoding(e.to_string())
    }
}
