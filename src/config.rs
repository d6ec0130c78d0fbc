//! Runtime configuration for log handles, readers and the diagnostic
//! subscriber.

use std::env;
use std::path::PathBuf;

/// Settings for the engine's own `tracing` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Also write diagnostics to this file (non-blocking).
    pub file: Option<PathBuf>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Mirror every written message as a `tracing` debug event.
    pub echo: bool,
    /// Create the log file when opening one that does not exist.
    pub create_if_missing: bool,
    /// Display-cache entries kept before the cache is recycled.
    pub cache_capacity: usize,
    /// Render display timestamps in UTC instead of local time.
    pub utc_timestamps: bool,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            echo: cfg!(debug_assertions),
            create_if_missing: true,
            cache_capacity: 4096,
            utc_timestamps: false,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl LogConfig {
    /// Verbose diagnostics and message echo.
    pub fn development() -> Self {
        Self {
            echo: true,
            diagnostics: DiagnosticsConfig {
                level: "debug".to_string(),
                file: None,
            },
            ..Default::default()
        }
    }

    /// Quiet, deterministic settings for tests.
    pub fn testing() -> Self {
        Self {
            echo: false,
            utc_timestamps: true,
            diagnostics: DiagnosticsConfig {
                level: "warn".to_string(),
                file: None,
            },
            ..Default::default()
        }
    }

    /// Defaults overridden by `VXLOG_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(echo) = lookup("VXLOG_ECHO").and_then(|v| parse_bool(&v)) {
            self.echo = echo;
        }
        if let Some(utc) = lookup("VXLOG_UTC").and_then(|v| parse_bool(&v)) {
            self.utc_timestamps = utc;
        }
        if let Some(capacity) = lookup("VXLOG_CACHE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.cache_capacity = capacity;
        }
        if let Some(level) = lookup("VXLOG_LEVEL") {
            self.diagnostics.level = level;
        }
        if let Some(file) = lookup("VXLOG_DIAG_FILE") {
            self.diagnostics.file = Some(PathBuf::from(file));
        }
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
