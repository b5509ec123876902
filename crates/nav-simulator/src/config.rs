//! # Simulator Configuration
//!
//! Environment-based configuration for the CLI host. Command-line flags
//! override these values.

use crate::engine::EngineConfig;
use crate::session::DEFAULT_SPEED_MULTIPLIER;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Host configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Real time between delivered frames
    pub frame_interval: Duration,

    /// Initial simulation speed multiplier
    pub speed_multiplier: f64,

    /// Upper bound on real time spent in a rest stop
    pub break_ceiling: Duration,

    /// Selection store location; in-memory when unset
    pub state_file: Option<PathBuf>,

    /// Telemetry ingest endpoint; pings disabled when unset
    pub telemetry_url: Option<String>,

    /// Logging level
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl SimulatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            var(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map_or(fallback, Duration::from_millis)
        };

        Self {
            frame_interval: millis("NAV_FRAME_MS", defaults.frame_interval),

            speed_multiplier: var("NAV_SPEED_MULTIPLIER")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|m| m.is_finite() && *m > 0.0)
                .unwrap_or(defaults.speed_multiplier),

            break_ceiling: millis("NAV_BREAK_CEILING_MS", defaults.break_ceiling),

            state_file: var("NAV_STATE_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            telemetry_url: var("TELEMETRY_URL").filter(|v| !v.trim().is_empty()),

            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),

            log_json: var("NAV_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.log_json),
        }
    }

    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            break_ceiling: self.break_ceiling,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            speed_multiplier: DEFAULT_SPEED_MULTIPLIER,
            break_ceiling: EngineConfig::default().break_ceiling,
            state_file: None,
            telemetry_url: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = SimulatorConfig::from_vars(lookup(&[]));
        assert_eq!(config, SimulatorConfig::default());
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = SimulatorConfig::from_vars(lookup(&[
            ("NAV_FRAME_MS", "33"),
            ("NAV_SPEED_MULTIPLIER", "12.5"),
            ("NAV_BREAK_CEILING_MS", "500"),
            ("NAV_STATE_FILE", "/tmp/nav.json"),
            ("TELEMETRY_URL", "http://localhost:8081/ingest"),
            ("LOG_LEVEL", "debug"),
            ("NAV_LOG_JSON", "1"),
        ]));

        assert_eq!(config.frame_interval, Duration::from_millis(33));
        assert!((config.speed_multiplier - 12.5).abs() < f64::EPSILON);
        assert_eq!(config.engine_config().break_ceiling, Duration::from_millis(500));
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/nav.json")));
        assert_eq!(config.telemetry_url.as_deref(), Some("http://localhost:8081/ingest"));
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = SimulatorConfig::from_vars(lookup(&[
            ("NAV_FRAME_MS", "0"),
            ("NAV_SPEED_MULTIPLIER", "-3"),
            ("NAV_BREAK_CEILING_MS", "soon"),
            ("TELEMETRY_URL", "  "),
        ]));

        assert_eq!(config, SimulatorConfig::default());
    }
}
