//! Settings file handling for `<config dir>/geekflash/settings.toml`

use std::path::{Path, PathBuf};

use geekflash_core::prelude::*;

use super::types::Settings;

const SETTINGS_FILENAME: &str = "settings.toml";
const TEMP_FILENAME: &str = ".settings.toml.tmp";

/// Default settings directory: `<platform config dir>/geekflash`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geekflash")
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILENAME)
}

/// Load settings, falling back to defaults when the file is missing or invalid
pub fn load_settings(config_dir: &Path) -> Settings {
    let path = settings_path(config_dir);

    if !path.exists() {
        debug!("No settings file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Write a commented default settings file if none exists.
///
/// Returns `true` when a file was created.
pub fn init_settings(config_dir: &Path) -> Result<bool> {
    std::fs::create_dir_all(config_dir)
        .map_err(|e| Error::settings(format!("Failed to create {:?}: {}", config_dir, e)))?;

    let path = settings_path(config_dir);
    if path.exists() {
        return Ok(false);
    }

    let default_content = r#"# GeekFlash Settings

[backend]
edl_program = "edl"
fastboot_program = "fastboot"
python_program = "python3"   # Runs avbtool
use_sudo = true              # edl needs raw USB access
command_timeout_secs = 30    # Per external command
edl_switch_delay_ms = 2000   # Wait after `fastboot oem edl`
boot_partition = "boot_a"
gpt_lun = 4
gpt_backup_sector = 1048543

[device]
poll_interval_ms = 3000

[logs]
max_lines = 0                # 0 = keep every line
"#;

    std::fs::write(&path, default_content)
        .map_err(|e| Error::settings(format!("Failed to write settings.toml: {}", e)))?;

    info!("Created default settings at {:?}", path);
    Ok(true)
}

/// Save settings to `settings.toml`
///
/// Uses atomic write (temp file + rename) and regenerates the header comment.
pub fn save_settings(config_dir: &Path, settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(config_dir)
        .map_err(|e| Error::settings(format!("Failed to create {:?}: {}", config_dir, e)))?;

    let path = settings_path(config_dir);
    let temp_path = config_dir.join(TEMP_FILENAME);

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::settings(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("# GeekFlash Settings\n\n{}", content);

    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::settings(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &path)
        .map_err(|e| Error::settings(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        assert_eq!(load_settings(temp.path()), Settings::default());
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let temp = tempdir().unwrap();
        std::fs::write(settings_path(temp.path()), "[backend\nuse_sudo = ").unwrap();
        assert_eq!(load_settings(temp.path()), Settings::default());
    }

    #[test]
    fn test_init_writes_parsable_defaults_once() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("geekflash");

        assert!(init_settings(&dir).unwrap());
        assert!(!init_settings(&dir).unwrap());

        let content = std::fs::read_to_string(settings_path(&dir)).unwrap();
        assert!(content.starts_with("# GeekFlash Settings"));
        assert_eq!(load_settings(&dir), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.backend.use_sudo = false;
        settings.backend.edl_program = "/opt/edl/edl".to_string();
        settings.logs.max_lines = 1000;

        save_settings(temp.path(), &settings).unwrap();

        assert_eq!(load_settings(temp.path()), settings);
        assert!(!temp.path().join(TEMP_FILENAME).exists());
    }
}
