//! Audio post-processing and WAV encoding.
//!
//! Everything here is a pure function over one buffer. The output of
//! [`PostProcessor::apply`] followed by [`encode_wav`] is what the result
//! cache stores.

use std::io::Cursor;
use std::time::Duration;

use crate::error::SynthesisError;

/// Mono f32 samples in `[-1.0, 1.0]` plus their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Scale so the loudest sample reaches `target_peak` of full scale.
/// Silence is left untouched.
pub fn normalize_peak(samples: &mut [f32], target_peak: f32) {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }
    let gain = target_peak / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Linear-interpolation resampling.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// Subtract the mean.
pub fn remove_dc_offset(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    let mean = mean as f32;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

/// First-order high-pass: `y[n] = x[n] - 0.95 * x[n-1]`, `y[0] = x[0]`.
pub fn high_pass(samples: &mut [f32]) {
    const COEFF: f32 = 0.95;
    let mut prev = match samples.first() {
        Some(&first) => first,
        None => return,
    };
    for s in samples.iter_mut().skip(1) {
        let x = *s;
        *s = x - COEFF * prev;
        prev = x;
    }
}

/// Which passes to run on engine output before it is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessor {
    pub target_sample_rate: Option<u32>,
    pub remove_dc: bool,
    pub high_pass: bool,
    /// Peak normalisation target; `None` disables normalisation.
    pub target_peak: Option<f32>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            target_sample_rate: None,
            remove_dc: false,
            high_pass: false,
            target_peak: Some(0.95),
        }
    }
}

impl PostProcessor {
    /// A processor that returns its input unchanged.
    pub fn passthrough() -> Self {
        Self {
            target_sample_rate: None,
            remove_dc: false,
            high_pass: false,
            target_peak: None,
        }
    }

    pub fn apply(&self, mut audio: AudioBuffer) -> AudioBuffer {
        if let Some(rate) = self.target_sample_rate {
            if rate != audio.sample_rate {
                audio.samples = resample_linear(&audio.samples, audio.sample_rate, rate);
                audio.sample_rate = rate;
            }
        }
        if self.remove_dc {
            remove_dc_offset(&mut audio.samples);
        }
        if self.high_pass {
            high_pass(&mut audio.samples);
        }
        if let Some(peak) = self.target_peak {
            normalize_peak(&mut audio.samples, peak);
        }
        audio
    }
}

/// Encode as 16-bit PCM mono WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, SynthesisError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        const I16_MAX_F32: f32 = i16::MAX as f32;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Read the header of an encoded WAV and return `(duration, sample_rate)`.
pub fn wav_duration(bytes: &[u8]) -> Result<(Duration, u32), hound::Error> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Err(hound::Error::FormatError("zero sample rate"));
    }
    let secs = reader.duration() as f64 / rate as f64;
    Ok((Duration::from_secs_f64(secs), rate))
}
