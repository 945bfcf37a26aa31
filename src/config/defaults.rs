pub(crate) fn default_content_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

pub(crate) fn default_fetch_timeout_secs() -> f32 {
    15.0
}

pub(crate) fn default_telemetry_enabled() -> bool {
    true
}

pub(crate) fn default_telemetry_url() -> String {
    "http://127.0.0.1:8080/api/telemetry/heartbeat".to_string()
}

pub(crate) fn default_heartbeat_interval_secs() -> f32 {
    30.0
}

pub(crate) fn default_toc_window_size() -> usize {
    50
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}
