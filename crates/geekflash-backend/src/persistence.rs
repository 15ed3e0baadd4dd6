//! Durable storage for the flashing configuration (`config.json`)

use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use geekflash_core::prelude::*;
use geekflash_core::AppConfig;

const CONFIG_FILENAME: &str = "config.json";
const LOCK_FILENAME: &str = ".config.json.lock";
const TEMP_FILENAME: &str = ".config.json.tmp";

/// Default data directory: `<platform data dir>/geekflash`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geekflash")
}

/// JSON file store for [`AppConfig`]
#[derive(Debug, Clone)]
pub struct ConfigPersistence {
    dir: PathBuf,
}

impl ConfigPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILENAME)
    }

    /// Read the stored configuration.
    ///
    /// A missing file yields the default configuration. An unreadable or
    /// unparsable file is a persistence error.
    pub fn load(&self) -> Result<AppConfig> {
        let path = self.path();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::persistence(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::persistence(format!("corrupt config {}: {}", path.display(), e))
        })
    }

    /// Write the configuration atomically (temp file + rename) while holding an
    /// exclusive lock on a sibling lock file.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::persistence(format!("failed to create {}: {}", self.dir.display(), e))
        })?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| Error::persistence(format!("failed to serialize config: {}", e)))?;

        let lock = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILENAME))
            .map_err(|e| Error::persistence(format!("failed to open lock file: {}", e)))?;
        lock.lock_exclusive()
            .map_err(|e| Error::persistence(format!("failed to lock config: {}", e)))?;

        let temp_path = self.dir.join(TEMP_FILENAME);
        write_file(&temp_path, json.as_bytes())?;

        std::fs::rename(&temp_path, self.path())
            .map_err(|e| Error::persistence(format!("failed to rename temp file: {}", e)))?;

        // Lock is released when `lock` is dropped
        debug!("Saved config to {}", self.path().display());
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| Error::persistence(format!("failed to create {}: {}", path.display(), e)))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| Error::persistence(format!("failed to write {}: {}", path.display(), e)))
}
