//! Logging configuration using tracing

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Overrides every other log directory source
pub const LOG_DIR_ENV: &str = "GEEKFLASH_LOG_DIR";

const LOG_FILE_PREFIX: &str = "geekflash.log";

/// Daily files kept before the oldest is removed
const MAX_LOG_FILES: usize = 14;

/// Initialize the logging subsystem
///
/// The log directory is chosen by [`resolve_log_directory`]. Log level is
/// controlled by the `GEEKFLASH_LOG` environment variable. Nothing is written
/// to stdout: it carries the NDJSON event stream.
///
/// # Examples
/// ```bash
/// GEEKFLASH_LOG=debug geekflash watch
/// GEEKFLASH_LOG_DIR=/tmp/gf-logs GEEKFLASH_LOG=geekflash_backend=trace geekflash run flash-boot
/// ```
pub fn init(data_dir: Option<&Path>) -> Result<()> {
    let log_dir = resolve_log_directory(data_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(&log_dir)
        .map_err(|e| Error::settings(format!("cannot log to {}: {}", log_dir.display(), e)))?;

    let env_filter = EnvFilter::try_from_env("GEEKFLASH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("geekflash=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!(
        "GeekFlash {} starting, logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    Ok(())
}

/// Where log files go.
///
/// `GEEKFLASH_LOG_DIR` wins when set and non-empty. Otherwise logs sit under
/// `<data_dir>/logs` next to the persisted configuration, falling back to the
/// platform local data dir when no data dir was given.
pub fn resolve_log_directory(data_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match data_dir {
        Some(dir) => dir.join("logs"),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geekflash")
            .join("logs"),
    }
}
