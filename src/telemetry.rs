//! Diagnostic output for the engine itself.
//!
//! The engine reports what it does (opening files, index refreshes,
//! corruption) through `tracing`. Embedders that already install a
//! subscriber can ignore this module; tools like the `vxlog` binary call
//! [`init`] once at startup.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::DiagnosticsConfig;
use crate::error::Result;

lazy_static! {
    /// Keeps the non-blocking file writer flushing for the life of the
    /// process.
    static ref FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);
}

/// Installs a global subscriber writing to stderr and, if configured, a file.
///
/// Returns `Ok(false)` without changing anything if a global subscriber is
/// already set.
pub fn init(config: &DiagnosticsConfig) -> Result<bool> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let file_layer = match &config.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(dir) = dir {
                fs::create_dir_all(dir)?;
            }
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            *FILE_GUARD.lock() = Some(guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .is_ok())
}
