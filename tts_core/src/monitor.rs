//! Rolling real-time-factor statistics.
//!
//! RTF = wall-clock generation time / produced audio duration. The monitor
//! keeps the last `window` samples and recomputes aggregates from them on
//! every `record`, so the cost per call is O(window), never O(lifetime).

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::error::ConfigError;

/// Samples retained when no explicit window is configured.
pub const DEFAULT_WINDOW: usize = 100;

/// Qualitative grade for an average RTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    /// Each band is inclusive of its lower bound: 0.1 is an `A`, not `A+`.
    pub fn from_rtf(avg_rtf: f64) -> Self {
        if avg_rtf < 0.1 {
            Grade::APlus
        } else if avg_rtf < 0.2 {
            Grade::A
        } else if avg_rtf < 0.3 {
            Grade::BPlus
        } else if avg_rtf < 0.5 {
            Grade::B
        } else if avg_rtf < 0.8 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One completed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub rtf: f64,
    pub response_time_ms: f64,
    pub audio_duration_s: f64,
    pub observed_at: Instant,
}

/// Aggregates over the current window plus the lifetime request count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub window_size: usize,
    pub avg_rtf: f64,
    pub min_rtf: f64,
    pub max_rtf: f64,
    pub rtf_p95: f64,
    pub rtf_p99: f64,
    pub avg_response_time_ms: f64,
    pub avg_audio_duration_s: f64,
    pub throughput_rps: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone)]
struct Aggregates {
    avg_rtf: f64,
    min_rtf: f64,
    max_rtf: f64,
    rtf_p95: f64,
    rtf_p99: f64,
    avg_response_time_ms: f64,
    avg_audio_duration_s: f64,
    throughput_rps: f64,
}

impl Default for Aggregates {
    fn default() -> Self {
        Self {
            avg_rtf: 0.0,
            min_rtf: f64::INFINITY,
            max_rtf: 0.0,
            rtf_p95: 0.0,
            rtf_p99: 0.0,
            avg_response_time_ms: 0.0,
            avg_audio_duration_s: 0.0,
            throughput_rps: 0.0,
        }
    }
}

impl Aggregates {
    fn compute(window: &VecDeque<MetricSample>) -> Self {
        let count = window.len();
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;

        let mut agg = Self::default();
        let (mut rtf_sum, mut resp_sum, mut audio_sum) = (0.0, 0.0, 0.0);
        for s in window {
            rtf_sum += s.rtf;
            resp_sum += s.response_time_ms;
            audio_sum += s.audio_duration_s;
            agg.min_rtf = agg.min_rtf.min(s.rtf);
            agg.max_rtf = agg.max_rtf.max(s.rtf);
        }
        agg.avg_rtf = rtf_sum / n;
        agg.avg_response_time_ms = resp_sum / n;
        agg.avg_audio_duration_s = audio_sum / n;

        if count >= 2 {
            let mut sorted: Vec<f64> = window.iter().map(|s| s.rtf).collect();
            sorted.sort_unstable_by(|a, b| a.total_cmp(b));
            agg.rtf_p95 = percentile(&sorted, 0.95);
            agg.rtf_p99 = percentile(&sorted, 0.99);

            // Lock order can differ from timestamp order, so scan for the bounds.
            let oldest = window.iter().map(|s| s.observed_at).min();
            let newest = window.iter().map(|s| s.observed_at).max();
            if let (Some(oldest), Some(newest)) = (oldest, newest) {
                let span = newest.saturating_duration_since(oldest).as_secs_f64();
                if span > 0.0 {
                    agg.throughput_rps = (count - 1) as f64 / span;
                }
            }
        }
        agg
    }
}

/// Value at index `floor(p * len)`, clamped to the last element.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[derive(Debug)]
struct MonitorState {
    window: VecDeque<MetricSample>,
    total_requests: u64,
    aggregates: Aggregates,
}

/// Thread-safe rolling window of request outcomes.
#[derive(Debug)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
    capacity: usize,
}

impl PerformanceMonitor {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self::with_window(window))
    }

    // `capacity` must be non-zero.
    fn with_window(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                window: VecDeque::with_capacity(capacity),
                total_requests: 0,
                aggregates: Aggregates::default(),
            }),
            capacity,
        }
    }

    pub fn window_capacity(&self) -> usize {
        self.capacity
    }

    /// Negative or NaN inputs are clamped to 0.0.
    pub fn record(&self, rtf: f64, response_time_ms: f64, audio_duration_s: f64) {
        self.record_at(rtf, response_time_ms, audio_duration_s, Instant::now())
    }

    /// [`record`](Self::record) against an explicit clock reading.
    pub fn record_at(
        &self,
        rtf: f64,
        response_time_ms: f64,
        audio_duration_s: f64,
        observed_at: Instant,
    ) {
        let sample = MetricSample {
            rtf: non_negative(rtf),
            response_time_ms: non_negative(response_time_ms),
            audio_duration_s: non_negative(audio_duration_s),
            observed_at,
        };

        let mut state = self.state.lock();
        if state.window.len() == self.capacity {
            state.window.pop_front();
        }
        state.window.push_back(sample);
        state.total_requests += 1;
        state.aggregates = Aggregates::compute(&state.window);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let state = self.state.lock();
        let agg = &state.aggregates;
        let empty = state.window.is_empty();
        PerformanceSnapshot {
            total_requests: state.total_requests,
            window_size: state.window.len(),
            avg_rtf: agg.avg_rtf,
            min_rtf: if empty { 0.0 } else { agg.min_rtf },
            max_rtf: agg.max_rtf,
            rtf_p95: agg.rtf_p95,
            rtf_p99: agg.rtf_p99,
            avg_response_time_ms: agg.avg_response_time_ms,
            avg_audio_duration_s: agg.avg_audio_duration_s,
            throughput_rps: agg.throughput_rps,
            grade: Grade::from_rtf(agg.avg_rtf),
        }
    }

    /// RTF values currently in the window, oldest first.
    pub fn trend(&self) -> Vec<f64> {
        self.state.lock().window.iter().map(|s| s.rtf).collect()
    }

    /// Back to the freshly constructed state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.window.clear();
        state.total_requests = 0;
        state.aggregates = Aggregates::default();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(PerformanceMonitor::new(0).unwrap_err(), ConfigError::ZeroWindow);
    }

    #[test]
    fn test_hundred_samples() {
        let monitor = PerformanceMonitor::new(100).unwrap();
        for i in 1..=100 {
            monitor.record(i as f64, 10.0, 1.0);
        }
        let snap = monitor.snapshot();
        assert_eq!(snap.total_requests, 100);
        assert_eq!(snap.avg_rtf, 50.5);
        assert_eq!(snap.rtf_p95, 96.0);
        assert_eq!(snap.rtf_p99, 100.0);
        assert_eq!(snap.min_rtf, 1.0);
        assert_eq!(snap.max_rtf, 100.0);
        assert_eq!(snap.grade, Grade::D);
    }

    #[test]
    fn test_percentiles_need_two_samples() {
        let monitor = PerformanceMonitor::new(10).unwrap();
        monitor.record(0.4, 100.0, 2.0);
        let snap = monitor.snapshot();
        assert_eq!(snap.rtf_p95, 0.0);
        assert_eq!(snap.rtf_p99, 0.0);
        assert_eq!(snap.throughput_rps, 0.0);
        assert_eq!(snap.min_rtf, 0.4);

        monitor.record(0.2, 100.0, 2.0);
        let snap = monitor.snapshot();
        // floor(0.95 * 2) = 1 -> larger value
        assert_eq!(snap.rtf_p95, 0.4);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_rtf(0.099), Grade::APlus);
        assert_eq!(Grade::from_rtf(0.10), Grade::A);
        assert_eq!(Grade::from_rtf(0.2), Grade::BPlus);
        assert_eq!(Grade::from_rtf(0.3), Grade::B);
        assert_eq!(Grade::from_rtf(0.5), Grade::C);
        assert_eq!(Grade::from_rtf(0.79), Grade::C);
        assert_eq!(Grade::from_rtf(0.8), Grade::D);
        assert_eq!(Grade::from_rtf(0.81), Grade::D);
        assert_eq!(Grade::APlus.to_string(), "A+");
    }

    #[test]
    fn test_window_drops_oldest() {
        let monitor = PerformanceMonitor::new(3).unwrap();
        for rtf in [0.1, 0.2, 0.3, 0.4, 0.5] {
            monitor.record(rtf, 1.0, 1.0);
        }
        assert_eq!(monitor.trend(), vec![0.3, 0.4, 0.5]);
        let snap = monitor.snapshot();
        assert_eq!(snap.total_requests, 5);
        assert_eq!(snap.window_size, 3);
        assert_eq!(snap.min_rtf, 0.3);
    }

    #[test]
    fn test_throughput_over_window_span() {
        let monitor = PerformanceMonitor::new(10).unwrap();
        let t0 = Instant::now();
        for i in 0..5 {
            monitor.record_at(0.2, 50.0, 1.0, t0 + Duration::from_millis(500 * i));
        }
        // 4 intervals across 2 seconds
        assert!((monitor.snapshot().throughput_rps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_span_ignores_record_order() {
        let monitor = PerformanceMonitor::new(10).unwrap();
        let t0 = Instant::now();
        // Recorded out of timestamp order, as contending threads can.
        monitor.record_at(0.2, 50.0, 1.0, t0 + Duration::from_secs(2));
        monitor.record_at(0.2, 50.0, 1.0, t0);
        monitor.record_at(0.2, 50.0, 1.0, t0 + Duration::from_secs(4));
        // 2 intervals across 4 seconds
        assert!((monitor.snapshot().throughput_rps - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_default_matches_new() {
        let default = PerformanceMonitor::default();
        let fresh = PerformanceMonitor::new(DEFAULT_WINDOW).unwrap();
        assert_eq!(default.window_capacity(), DEFAULT_WINDOW);
        assert_eq!(default.snapshot(), fresh.snapshot());
    }

    #[test]
    fn test_zero_span_throughput() {
        let monitor = PerformanceMonitor::new(10).unwrap();
        let t0 = Instant::now();
        monitor.record_at(0.2, 50.0, 1.0, t0);
        monitor.record_at(0.2, 50.0, 1.0, t0);
        assert_eq!(monitor.snapshot().throughput_rps, 0.0);
    }

    #[test]
    fn test_trend_is_a_copy() {
        let monitor = PerformanceMonitor::new(10).unwrap();
        monitor.record(0.1, 1.0, 1.0);
        let trend = monitor.trend();
        monitor.record(0.2, 1.0, 1.0);
        assert_eq!(trend, vec![0.1]);
    }

    #[test]
    fn test_reset_matches_fresh() {
        let fresh = PerformanceMonitor::new(5).unwrap().snapshot();
        let monitor = PerformanceMonitor::new(5).unwrap();
        monitor.record(0.3, 120.0, 3.0);
        monitor.record(0.05, 2.0, 3.0);
        monitor.reset();
        assert_eq!(monitor.snapshot(), fresh);
        assert!(monitor.trend().is_empty());

        // min starts unbounded again
        monitor.record(7.0, 1.0, 1.0);
        assert_eq!(monitor.snapshot().min_rtf, 7.0);
    }

    #[test]
    fn test_negative_inputs_clamped() {
        let monitor = PerformanceMonitor::new(5).unwrap();
        monitor.record(-1.0, f64::NAN, -3.0);
        let snap = monitor.snapshot();
        assert_eq!(snap.avg_rtf, 0.0);
        assert_eq!(snap.avg_response_time_ms, 0.0);
        assert_eq!(snap.avg_audio_duration_s, 0.0);
    }
}
