//! Contract with the neural synthesis engine.

use crate::audio::AudioBuffer;
use crate::error::SynthesisError;
use crate::keys::SynthesisParams;

/// A blocking text-to-speech backend.
///
/// Implementations may take seconds per call; the orchestrator runs them on
/// the blocking thread pool and never while holding a cache or monitor lock.
///
/// `params` are opaque to the orchestrator. Every distinct parameter set
/// gets its own cache entry, whether or not the engine acts on it.
pub trait SpeechEngine: Send + Sync + 'static {
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        params: &SynthesisParams,
    ) -> Result<AudioBuffer, SynthesisError>;

    /// Voice identifiers this engine accepts.
    fn voices(&self) -> Vec<String>;

    /// Voice used when a request doesn't name one.
    fn default_voice(&self) -> Option<String> {
        self.voices().into_iter().next()
    }
}

/// Stand-in used when no engine is configured. Every call fails with
/// [`SynthesisError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl SpeechEngine for UnavailableEngine {
    fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _params: &SynthesisParams,
    ) -> Result<AudioBuffer, SynthesisError> {
        Err(SynthesisError::Unavailable(self.reason.clone()))
    }

    fn voices(&self) -> Vec<String> {
        Vec::new()
    }
}
