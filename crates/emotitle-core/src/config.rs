use chrono::Duration;
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_PIPE_NAME: &str = "emotitle";
pub const DEFAULT_TEMP_TTL_MS: i64 = 1_000;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const MIN_TICK_MS: u64 = 10;
const MAX_TICK_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotitleConfig {
    pub pipe_name: String,
    pub temp_ttl_ms: i64,
    pub tick_ms: u64,
    pub log_level: String,
}

impl Default for EmotitleConfig {
    fn default() -> Self {
        Self {
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            temp_ttl_ms: DEFAULT_TEMP_TTL_MS,
            tick_ms: DEFAULT_TICK_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EmotitleConfig {
    pub fn from_btreemap(configuration: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();

        let pipe_name = configuration
            .get("pipe_name")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.pipe_name);

        let temp_ttl_ms = match configuration.get("temp_ttl_ms") {
            None => defaults.temp_ttl_ms,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    warn!(event = "config_invalid", key = "temp_ttl_ms", value = %raw);
                    defaults.temp_ttl_ms
                }
            },
        };

        let tick_ms = match configuration.get("tick_ms") {
            None => defaults.tick_ms,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(value) => value.clamp(MIN_TICK_MS, MAX_TICK_MS),
                Err(_) => {
                    warn!(event = "config_invalid", key = "tick_ms", value = %raw);
                    defaults.tick_ms
                }
            },
        };

        let log_level = configuration
            .get("log_level")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| matches!(v.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
            .unwrap_or(defaults.log_level);

        Self {
            pipe_name,
            temp_ttl_ms,
            tick_ms,
            log_level,
        }
    }

    pub fn temp_ttl(&self) -> Duration {
        Duration::milliseconds(self.temp_ttl_ms)
    }

    /// Timer period in seconds, as the host's `set_timeout` expects.
    pub fn tick_secs(&self) -> f64 {
        self.tick_ms as f64 / 1_000.0
    }
}
