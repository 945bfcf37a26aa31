use super::defaults;
use super::models::{AppConfig, LogLevel};
use crate::chapter::ReadingMode;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    content: ContentConfig,
    #[serde(default)]
    telemetry: TelemetryConfig,
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            content_base_url: tables.content.base_url,
            fetch_timeout_secs: tables.content.fetch_timeout_secs,
            telemetry_enabled: tables.telemetry.enabled,
            telemetry_url: tables.telemetry.url,
            heartbeat_interval_secs: tables.telemetry.heartbeat_interval_secs,
            reading_mode: tables.reading.mode,
            toc_window_size: tables.reading.toc_window_size,
            log_level: tables.logging.log_level,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContentConfig {
    #[serde(default = "defaults::default_content_base_url")]
    base_url: String,
    #[serde(default = "defaults::default_fetch_timeout_secs")]
    fetch_timeout_secs: f32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig {
            base_url: defaults::default_content_base_url(),
            fetch_timeout_secs: defaults::default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TelemetryConfig {
    #[serde(default = "defaults::default_telemetry_enabled")]
    enabled: bool,
    #[serde(default = "defaults::default_telemetry_url")]
    url: String,
    #[serde(default = "defaults::default_heartbeat_interval_secs")]
    heartbeat_interval_secs: f32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            enabled: defaults::default_telemetry_enabled(),
            url: defaults::default_telemetry_url(),
            heartbeat_interval_secs: defaults::default_heartbeat_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ReadingConfig {
    #[serde(default)]
    mode: ReadingMode,
    #[serde(default = "defaults::default_toc_window_size")]
    toc_window_size: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            mode: ReadingMode::default(),
            toc_window_size: defaults::default_toc_window_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
