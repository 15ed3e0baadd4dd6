//! Payloads of the two backend event feeds: `device-status` and `log-line`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feed name for device connectivity events
pub const DEVICE_STATUS_EVENT: &str = "device-status";

/// Feed name for backend log output
pub const LOG_LINE_EVENT: &str = "log-line";

/// USB connection mode reported for the attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    Edl,
    Fastboot,
    #[default]
    Disconnected,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::Edl => "edl",
            DeviceMode::Fastboot => "fastboot",
            DeviceMode::Disconnected => "disconnected",
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, DeviceMode::Disconnected)
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation of the device's connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceStatus {
    pub mode: DeviceMode,
    /// Serialized as Unix milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl DeviceStatus {
    pub fn new(mode: DeviceMode, timestamp: DateTime<Utc>) -> Self {
        Self { mode, timestamp }
    }

    /// Observation stamped with the current time
    pub fn now(mode: DeviceMode) -> Self {
        Self::new(mode, Utc::now())
    }

    pub fn disconnected() -> Self {
        Self::now(DeviceMode::Disconnected)
    }
}

/// Which child stream a log line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStreamKind {
    Stdout,
    Stderr,
}

impl LogStreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStreamKind::Stdout => "stdout",
            LogStreamKind::Stderr => "stderr",
        }
    }
}

/// One line of backend output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogLine {
    /// RFC 3339 display timestamp
    pub timestamp: String,
    pub stream: LogStreamKind,
    pub content: String,
}

impl LogLine {
    pub fn new(stream: LogStreamKind, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            stream,
            content: content.into(),
        }
    }

    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new(LogStreamKind::Stdout, content)
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new(LogStreamKind::Stderr, content)
    }

    pub fn is_error(&self) -> bool {
        self.stream == LogStreamKind::Stderr
    }
}
