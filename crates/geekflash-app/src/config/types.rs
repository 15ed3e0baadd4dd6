//! Console settings types
//!
//! Defines:
//! - `Settings` - Contents of `settings.toml`
//! - `BackendSettings`, `DeviceSettings`, `LogSettings` - its sections

use std::time::Duration;

use serde::{Deserialize, Serialize};

use geekflash_backend::CommandOptions;

/// Console settings (`settings.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub logs: LogSettings,
}

/// External tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendSettings {
    #[serde(default = "default_edl_program")]
    pub edl_program: String,

    #[serde(default = "default_fastboot_program")]
    pub fastboot_program: String,

    #[serde(default = "default_python_program")]
    pub python_program: String,

    /// Prefix `edl` invocations with sudo
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    /// Per-command timeout
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Pause between `fastboot oem edl` and the EDL write
    #[serde(default = "default_edl_switch_delay_ms")]
    pub edl_switch_delay_ms: u64,

    #[serde(default = "default_boot_partition")]
    pub boot_partition: String,

    #[serde(default = "default_gpt_lun")]
    pub gpt_lun: u32,

    #[serde(default = "default_gpt_backup_sector")]
    pub gpt_backup_sector: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            edl_program: default_edl_program(),
            fastboot_program: default_fastboot_program(),
            python_program: default_python_program(),
            use_sudo: true,
            command_timeout_secs: default_command_timeout_secs(),
            edl_switch_delay_ms: default_edl_switch_delay_ms(),
            boot_partition: default_boot_partition(),
            gpt_lun: default_gpt_lun(),
            gpt_backup_sector: default_gpt_backup_sector(),
        }
    }
}

impl BackendSettings {
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            edl_program: self.edl_program.clone(),
            fastboot_program: self.fastboot_program.clone(),
            python_program: self.python_program.clone(),
            use_sudo: self.use_sudo,
            edl_switch_delay_ms: self.edl_switch_delay_ms,
            boot_partition: self.boot_partition.clone(),
            gpt_lun: self.gpt_lun,
            gpt_backup_sector: self.gpt_backup_sector,
        }
    }

    /// Timeout clamped to at least one second
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

/// USB device polling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Minimum device poll interval
pub const POLL_INTERVAL_MIN_MS: u64 = 250;

impl DeviceSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(POLL_INTERVAL_MIN_MS))
    }
}

/// Log stream buffering
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Ring-buffer capacity; 0 keeps every line
    #[serde(default)]
    pub max_lines: usize,
}

impl LogSettings {
    pub fn capacity(&self) -> Option<usize> {
        (self.max_lines > 0).then_some(self.max_lines)
    }
}

fn default_edl_program() -> String {
    "edl".to_string()
}

fn default_fastboot_program() -> String {
    "fastboot".to_string()
}

fn default_python_program() -> String {
    "python3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_edl_switch_delay_ms() -> u64 {
    2000
}

fn default_boot_partition() -> String {
    "boot_a".to_string()
}

fn default_gpt_lun() -> u32 {
    4
}

fn default_gpt_backup_sector() -> u64 {
    1_048_543
}

fn default_poll_interval_ms() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.backend.command_options(), CommandOptions::default());
        assert_eq!(settings.backend.command_timeout(), Duration::from_secs(30));
        assert_eq!(settings.device.poll_interval(), Duration::from_millis(3000));
        assert_eq!(settings.logs.capacity(), None);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[backend]
use_sudo = false
gpt_lun = 5

[logs]
max_lines = 500
"#,
        )
        .unwrap();

        assert!(!settings.backend.use_sudo);
        assert_eq!(settings.backend.gpt_lun, 5);
        assert_eq!(settings.backend.edl_program, "edl");
        assert_eq!(settings.device.poll_interval_ms, 3000);
        assert_eq!(settings.logs.capacity(), Some(500));
    }

    #[test]
    fn test_intervals_are_clamped() {
        let device = DeviceSettings { poll_interval_ms: 1 };
        assert_eq!(device.poll_interval(), Duration::from_millis(POLL_INTERVAL_MIN_MS));

        let backend = BackendSettings {
            command_timeout_secs: 0,
            ..BackendSettings::default()
        };
        assert_eq!(backend.command_timeout(), Duration::from_secs(1));
    }
}
