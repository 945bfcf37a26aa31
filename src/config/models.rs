use crate::chapter::ReadingMode;
use serde::Deserialize;
use std::time::Duration;

/// Shortest interval or timeout the engine accepts, in seconds.
pub(crate) const MIN_SECS: f32 = 1.0;

/// High-level engine configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_content_base_url")]
    pub content_base_url: String,
    #[serde(default = "crate::config::defaults::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: f32,
    #[serde(default = "crate::config::defaults::default_telemetry_enabled")]
    pub telemetry_enabled: bool,
    #[serde(default = "crate::config::defaults::default_telemetry_url")]
    pub telemetry_url: String,
    #[serde(default = "crate::config::defaults::default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: f32,
    #[serde(default)]
    pub reading_mode: ReadingMode,
    #[serde(default = "crate::config::defaults::default_toc_window_size")]
    pub toc_window_size: usize,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            content_base_url: crate::config::defaults::default_content_base_url(),
            fetch_timeout_secs: crate::config::defaults::default_fetch_timeout_secs(),
            telemetry_enabled: crate::config::defaults::default_telemetry_enabled(),
            telemetry_url: crate::config::defaults::default_telemetry_url(),
            heartbeat_interval_secs: crate::config::defaults::default_heartbeat_interval_secs(),
            reading_mode: ReadingMode::default(),
            toc_window_size: crate::config::defaults::default_toc_window_size(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    /// Clamp values that would stall or break the engine.
    pub fn sanitized(mut self) -> Self {
        self.fetch_timeout_secs = sanitize_secs(
            self.fetch_timeout_secs,
            crate::config::defaults::default_fetch_timeout_secs(),
        );
        self.heartbeat_interval_secs = sanitize_secs(
            self.heartbeat_interval_secs,
            crate::config::defaults::default_heartbeat_interval_secs(),
        );
        self.toc_window_size = self.toc_window_size.max(1);
        self.content_base_url = self.content_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f32(sanitize_secs(
            self.fetch_timeout_secs,
            crate::config::defaults::default_fetch_timeout_secs(),
        ))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f32(sanitize_secs(
            self.heartbeat_interval_secs,
            crate::config::defaults::default_heartbeat_interval_secs(),
        ))
    }
}

fn sanitize_secs(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.max(MIN_SECS)
    } else {
        fallback
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
