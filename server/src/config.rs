// Configuration constants for the server

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// 0 disables the background expiry sweep.
    pub cache_sweep_interval_secs: u64,
    pub voice_map: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            cache_sweep_interval_secs: 0,
            voice_map: "models/map.json".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let cache_sweep_interval_secs = std::env::var("CACHE_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.cache_sweep_interval_secs);

        let voice_map = std::env::var("VOICE_MAP").unwrap_or(defaults.voice_map);

        Self {
            port,
            request_timeout_secs,
            cors_allowed_origins,
            cache_sweep_interval_secs,
            voice_map,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_interval_secs > 0).then(|| Duration::from_secs(self.cache_sweep_interval_secs))
    }
}
