//! Cache fingerprints for synthesis requests.
//!
//! Text is trimmed and lower-cased before hashing, so "Hello" and
//! "  hello  " share one cache slot. Parameters are sorted by name so the
//! order a caller supplies them in never changes the fingerprint.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single synthesis parameter value (speed, pitch, speaker id, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Parameters forwarded to the engine alongside text and voice.
pub type SynthesisParams = HashMap<String, ParamValue>;

impl ParamValue {
    /// Type-tagged textual form, so `Int(1)` and `Float(1.0)` stay distinct.
    fn canonical(&self) -> String {
        match self {
            ParamValue::Bool(b) => format!("b:{b}"),
            ParamValue::Int(i) => format!("i:{i}"),
            ParamValue::Float(x) => format!("f:{x}"),
            ParamValue::Text(s) => format!("s:{s}"),
        }
    }
}

/// Derives stable fingerprints from `(text, voice, params)`.
///
/// Stateless; one value can be shared by any number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Hex-encoded SHA-256 (64 chars) of the canonical request form.
    pub fn derive(&self, text: &str, voice: &str, params: &SynthesisParams) -> String {
        let mut sorted: Vec<(&str, String)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.canonical()))
            .collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        update_field(&mut hasher, normalize_text(text).as_bytes());
        update_field(&mut hasher, voice.as_bytes());
        hasher.update((sorted.len() as u64).to_le_bytes());
        for (name, value) in &sorted {
            update_field(&mut hasher, name.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

// Length prefix keeps field boundaries unambiguous.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Trim surrounding whitespace and lower-case.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
