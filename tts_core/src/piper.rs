//! Piper engine binding (feature `piper`).
//!
//! Voices come from a JSON map file:
//! `{ "en_US": "models/en_US/voice.onnx.json" }` or
//! `{ "en_US": { "config": "..." } }`. Other keys in an object entry are
//! ignored. Loaded synthesizers are kept per config path for the life of
//! the engine.
//!
//! Piper has no per-request knobs, so synthesis parameters are accepted and
//! ignored. They still take part in the cache fingerprint.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::info;

use crate::audio::AudioBuffer;
use crate::engine::SpeechEngine;
use crate::error::SynthesisError;
use crate::keys::SynthesisParams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEntry {
    pub config: String,
}

struct LoadedSynth {
    synth: Arc<PiperSpeechSynthesizer>,
    sample_rate: u32,
}

pub struct PiperEngine {
    voices: HashMap<String, VoiceEntry>,
    default_voice: Option<String>,
    loaded: RwLock<HashMap<String, LoadedSynth>>,
}

impl PiperEngine {
    pub fn new(voices: HashMap<String, VoiceEntry>, default_voice: Option<String>) -> Self {
        Self {
            voices,
            default_voice,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Load the voice map from a JSON file.
    pub fn from_mapfile<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "voice map is not valid JSON")?;
        let obj = json
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("voice map must be a JSON object"))?;

        let mut voices = HashMap::new();
        for (name, v) in obj {
            let entry = match v {
                serde_json::Value::String(path) => VoiceEntry {
                    config: path.clone(),
                },
                serde_json::Value::Object(o) => VoiceEntry {
                    config: o
                        .get("config")
                        .and_then(|x| x.as_str())
                        .ok_or_else(|| anyhow::anyhow!("missing 'config' for voice {}", name))?
                        .to_string(),
                },
                _ => {
                    return Err(anyhow::anyhow!(
                        "invalid entry for voice {} (expected string or object)",
                        name
                    ))
                }
            };
            voices.insert(name.clone(), entry);
        }

        let mut names: Vec<&String> = voices.keys().collect();
        names.sort();
        let default_voice = names.first().map(|s| s.to_string());
        info!(voices = voices.len(), "loaded piper voice map");
        Ok(Self::new(voices, default_voice))
    }

    fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;
        json.get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .map(|sr| sr as u32)
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))
    }

    fn synth_for(&self, cfg_path: &str) -> anyhow::Result<(Arc<PiperSpeechSynthesizer>, u32)> {
        if let Some(loaded) = self.loaded.read().get(cfg_path) {
            return Ok((loaded.synth.clone(), loaded.sample_rate));
        }

        // Load outside the lock; model loading takes seconds.
        let sample_rate = Self::read_sample_rate(cfg_path)?;
        let model = piper_rs::from_config_path(Path::new(cfg_path))
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = Arc::new(PiperSpeechSynthesizer::new(model)?);
        info!(config = cfg_path, sample_rate, "loaded piper model");

        let mut loaded = self.loaded.write();
        let entry = loaded.entry(cfg_path.to_string()).or_insert(LoadedSynth {
            synth,
            sample_rate,
        });
        Ok((entry.synth.clone(), entry.sample_rate))
    }
}

impl SpeechEngine for PiperEngine {
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        _params: &SynthesisParams,
    ) -> Result<AudioBuffer, SynthesisError> {
        let entry = self
            .voices
            .get(voice)
            .ok_or_else(|| SynthesisError::UnknownVoice(voice.to_string()))?;
        let (synth, sample_rate) = self.synth_for(&entry.config)?;

        let iter: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }
        Ok(AudioBuffer::new(samples, sample_rate))
    }

    fn voices(&self) -> Vec<String> {
        self.voices.keys().cloned().collect()
    }

    fn default_voice(&self) -> Option<String> {
        self.default_voice.clone()
    }
}
