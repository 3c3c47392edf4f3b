// Configuration for the synthesis service

use std::str::FromStr;
use std::time::Duration;

use crate::audio::PostProcessor;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub monitor_window: usize,
    pub synthesis_timeout_secs: u64,
    pub post_processor: PostProcessor,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 500,
            cache_ttl_secs: 3600, // 1 hour TTL
            monitor_window: crate::monitor::DEFAULT_WINDOW,
            synthesis_timeout_secs: 60,
            post_processor: PostProcessor::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let normalize = flag("POSTPROCESS_NORMALIZE", true);
        let target_peak: f32 = parsed(&lookup, "POSTPROCESS_TARGET_PEAK").unwrap_or(0.95);

        Self {
            cache_capacity: parsed(&lookup, "CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            cache_ttl_secs: parsed(&lookup, "CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            monitor_window: parsed(&lookup, "MONITOR_WINDOW").unwrap_or(defaults.monitor_window),
            synthesis_timeout_secs: parsed(&lookup, "SYNTHESIS_TIMEOUT_SECS")
                .unwrap_or(defaults.synthesis_timeout_secs),
            post_processor: PostProcessor {
                target_sample_rate: parsed(&lookup, "POSTPROCESS_SAMPLE_RATE"),
                remove_dc: flag("POSTPROCESS_REMOVE_DC", false),
                high_pass: flag("POSTPROCESS_HIGH_PASS", false),
                target_peak: normalize.then_some(target_peak),
            },
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
