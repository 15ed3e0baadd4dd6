//! NDJSON event output
//!
//! Every console command reports through structured JSON events on stdout,
//! one event per line, so scripts can drive flashing without scraping text.
//! Diagnostics go to the log file, never to stdout.
//!
//! # Example Output
//!
//! ```json
//! {"event":"device_status","mode":"edl","device_timestamp":1704700001000,"timestamp":1704700001002}
//! {"event":"operation_started","operation":"flash-boot","timestamp":1704700002000}
//! {"event":"log","stream":"stdout","content":"[1/2] Running: fastboot oem edl","timestamp":1704700002001}
//! {"event":"operation_completed","operation":"flash-boot","exit_code":0,"duration_ms":5120,"timestamp":1704700007121}
//! ```

pub mod runner;

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use geekflash_app::ReadinessFlags;
use geekflash_backend::ToolAvailability;
use geekflash_core::{
    AppConfig, CommandResult, ConfigField, DeviceMode, DeviceStatus, LogLine, LogStreamKind,
    Operation,
};

/// Events emitted on stdout
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Latest device mode and when it was observed
    DeviceStatus {
        mode: DeviceMode,
        device_timestamp: i64,
        timestamp: i64,
    },

    /// One line of backend output
    Log {
        stream: LogStreamKind,
        content: String,
        /// When the backend produced the line (RFC 3339)
        logged_at: String,
        timestamp: i64,
    },

    /// Current persisted configuration
    Config { config: AppConfig, timestamp: i64 },

    /// Which operations may run with the current configuration
    Readiness {
        readiness: ReadinessFlags,
        ready: Vec<Operation>,
        timestamp: i64,
    },

    /// A file selection was refused; the field was left unchanged
    SelectionRejected {
        field: ConfigField,
        path: String,
        reason: String,
        timestamp: i64,
    },

    OperationStarted { operation: Operation, timestamp: i64 },

    OperationCompleted {
        operation: Operation,
        exit_code: i32,
        duration_ms: u64,
        timestamp: i64,
    },

    /// `exit_code` is absent when the backend could not be invoked
    OperationFailed {
        operation: Operation,
        exit_code: Option<i32>,
        detail: String,
        timestamp: i64,
    },

    /// Resolution of the external programs
    Tools {
        tools: ToolAvailability,
        all_available: bool,
        timestamp: i64,
    },

    SettingsInitialized {
        path: String,
        created: bool,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Scripts read line by line
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn device_status(status: &DeviceStatus) -> Self {
        Self::DeviceStatus {
            mode: status.mode,
            device_timestamp: status.timestamp.timestamp_millis(),
            timestamp: Self::now(),
        }
    }

    pub fn log(line: &LogLine) -> Self {
        Self::Log {
            stream: line.stream,
            content: line.content.clone(),
            logged_at: line.timestamp.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn config(config: &AppConfig) -> Self {
        Self::Config {
            config: config.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn readiness(readiness: ReadinessFlags) -> Self {
        Self::Readiness {
            readiness,
            ready: readiness.ready_operations(),
            timestamp: Self::now(),
        }
    }

    pub fn selection_rejected(field: ConfigField, path: &Path, reason: String) -> Self {
        Self::SelectionRejected {
            field,
            path: path.display().to_string(),
            reason,
            timestamp: Self::now(),
        }
    }

    pub fn operation_started(operation: Operation) -> Self {
        Self::OperationStarted {
            operation,
            timestamp: Self::now(),
        }
    }

    pub fn operation_completed(operation: Operation, result: CommandResult) -> Self {
        Self::OperationCompleted {
            operation,
            exit_code: result.exit_code,
            duration_ms: result.duration_ms,
            timestamp: Self::now(),
        }
    }

    pub fn operation_failed(operation: Operation, exit_code: Option<i32>, detail: String) -> Self {
        Self::OperationFailed {
            operation,
            exit_code,
            detail,
            timestamp: Self::now(),
        }
    }

    pub fn tools(tools: ToolAvailability) -> Self {
        let all_available = tools.all_available();
        Self::Tools {
            tools,
            all_available,
            timestamp: Self::now(),
        }
    }

    pub fn settings_initialized(path: &Path, created: bool) -> Self {
        Self::SettingsInitialized {
            path: path.display().to_string(),
            created,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
