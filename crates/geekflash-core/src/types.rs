//! Flashing configuration types
//!
//! Defines:
//! - `AppConfig` - artifact paths and AVB signing parameters
//! - `AvbParams` / `AvbProp` - the signing parameter record
//! - `PartialAppConfig` - a whole-or-nothing patch onto `AppConfig`
//! - `ConfigField` - the seven path fields, addressable by name

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single `--prop key:value` pair embedded in the AVB footer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AvbProp {
    pub key: String,
    pub value: String,
}

impl AvbProp {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// AVB hash footer parameters, forwarded verbatim to the signing backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AvbParams {
    pub partition_name: String,
    pub partition_size: u64,
    pub algorithm: String,
    pub rollback_index: u64,
    pub salt: String,
    /// Order is significant and duplicates are kept
    pub props: Vec<AvbProp>,
}

impl Default for AvbParams {
    fn default() -> Self {
        Self {
            partition_name: "boot".to_string(),
            partition_size: 100_663_296,
            algorithm: "SHA256_RSA4096".to_string(),
            rollback_index: 1_738_713_600,
            salt: "2919b99b88ac41218ee8054ad02c4e1fb8c631c0b79c541c530d6bb743ea7c09".to_string(),
            props: vec![
                AvbProp::new("com.android.build.boot.os_version", "15"),
                AvbProp::new(
                    "com.android.build.boot.fingerprint",
                    "Lenovo/TB322FC_PRC/TB322FC:15/AQ3A.250129.001/ZUXOS_1.1.11.044_250524_PRC:user/release-keys",
                ),
                AvbProp::new("com.android.build.boot.security_patch", "2025-02-05"),
            ],
        }
    }
}

/// The persisted flashing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    pub firehose_loader: Option<PathBuf>,
    pub patched_boot_img: Option<PathBuf>,
    pub stock_boot_img: Option<PathBuf>,
    pub gpt_main_bin: Option<PathBuf>,
    pub gpt_backup_bin: Option<PathBuf>,
    pub avbtool_path: Option<PathBuf>,
    pub avb_key_path: Option<PathBuf>,
    #[serde(default)]
    pub avb_params: AvbParams,
}

impl AppConfig {
    /// Read a path field by name
    pub fn field(&self, field: ConfigField) -> Option<&Path> {
        match field {
            ConfigField::FirehoseLoader => self.firehose_loader.as_deref(),
            ConfigField::PatchedBootImg => self.patched_boot_img.as_deref(),
            ConfigField::StockBootImg => self.stock_boot_img.as_deref(),
            ConfigField::GptMainBin => self.gpt_main_bin.as_deref(),
            ConfigField::GptBackupBin => self.gpt_backup_bin.as_deref(),
            ConfigField::AvbtoolPath => self.avbtool_path.as_deref(),
            ConfigField::AvbKeyPath => self.avb_key_path.as_deref(),
        }
    }

    fn field_mut(&mut self, field: ConfigField) -> &mut Option<PathBuf> {
        match field {
            ConfigField::FirehoseLoader => &mut self.firehose_loader,
            ConfigField::PatchedBootImg => &mut self.patched_boot_img,
            ConfigField::StockBootImg => &mut self.stock_boot_img,
            ConfigField::GptMainBin => &mut self.gpt_main_bin,
            ConfigField::GptBackupBin => &mut self.gpt_backup_bin,
            ConfigField::AvbtoolPath => &mut self.avbtool_path,
            ConfigField::AvbKeyPath => &mut self.avb_key_path,
        }
    }

    pub fn is_set(&self, field: ConfigField) -> bool {
        self.field(field).is_some()
    }

    /// Return a copy of this config with `patch` merged on top.
    ///
    /// Top-level fields are merged one by one; `avb_params`, when present in
    /// the patch, replaces the whole sub-record.
    pub fn merged(&self, patch: &PartialAppConfig) -> AppConfig {
        let mut next = self.clone();
        for (field, value) in &patch.paths {
            *next.field_mut(*field) = value.clone();
        }
        if let Some(ref params) = patch.avb_params {
            next.avb_params = params.clone();
        }
        next
    }
}

/// A patch onto [`AppConfig`].
///
/// Fields not mentioned are left unchanged. A mentioned path field is either
/// set to a path or cleared. `avb_params` is all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialAppConfig {
    paths: Vec<(ConfigField, Option<PathBuf>)>,
    avb_params: Option<AvbParams>,
}

impl PartialAppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a path field (a later entry for the same field wins)
    pub fn set(mut self, field: ConfigField, path: impl Into<PathBuf>) -> Self {
        self.put(field, Some(path.into()));
        self
    }

    /// Clear a path field
    pub fn clear(mut self, field: ConfigField) -> Self {
        self.put(field, None);
        self
    }

    /// Replace the whole AVB parameter record
    pub fn avb_params(mut self, params: AvbParams) -> Self {
        self.avb_params = Some(params);
        self
    }

    fn put(&mut self, field: ConfigField, value: Option<PathBuf>) {
        self.paths.retain(|(f, _)| *f != field);
        self.paths.push((field, value));
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.avb_params.is_none()
    }

    /// Fields this patch touches, in insertion order
    pub fn fields(&self) -> impl Iterator<Item = ConfigField> + '_ {
        self.paths.iter().map(|(f, _)| *f)
    }
}

/// File-extension filter shown by the artifact picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

impl FileFilter {
    /// Case-insensitive extension check; an empty extension list accepts anything
    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// The seven artifact path fields of [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    FirehoseLoader,
    PatchedBootImg,
    StockBootImg,
    GptMainBin,
    GptBackupBin,
    AvbtoolPath,
    AvbKeyPath,
}

impl ConfigField {
    pub const ALL: [ConfigField; 7] = [
        ConfigField::FirehoseLoader,
        ConfigField::PatchedBootImg,
        ConfigField::StockBootImg,
        ConfigField::GptMainBin,
        ConfigField::GptBackupBin,
        ConfigField::AvbtoolPath,
        ConfigField::AvbKeyPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::FirehoseLoader => "firehose_loader",
            ConfigField::PatchedBootImg => "patched_boot_img",
            ConfigField::StockBootImg => "stock_boot_img",
            ConfigField::GptMainBin => "gpt_main_bin",
            ConfigField::GptBackupBin => "gpt_backup_bin",
            ConfigField::AvbtoolPath => "avbtool_path",
            ConfigField::AvbKeyPath => "avb_key_path",
        }
    }

    /// Extension filter offered when picking this artifact
    pub fn filter(&self) -> FileFilter {
        match self {
            ConfigField::FirehoseLoader => FileFilter {
                name: "ELF Loader",
                extensions: &["elf"],
            },
            ConfigField::PatchedBootImg | ConfigField::StockBootImg => FileFilter {
                name: "Boot Image",
                extensions: &["img"],
            },
            ConfigField::GptMainBin | ConfigField::GptBackupBin => FileFilter {
                name: "GPT Binary",
                extensions: &["bin"],
            },
            ConfigField::AvbtoolPath => FileFilter {
                name: "Python Script",
                extensions: &["py"],
            },
            ConfigField::AvbKeyPath => FileFilter {
                name: "PEM Key",
                extensions: &["pem"],
            },
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ConfigField::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| Error::InvalidField {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.avb_params.partition_name, "boot");
        assert_eq!(cfg.avb_params.partition_size, 100663296);
        assert_eq!(cfg.avb_params.algorithm, "SHA256_RSA4096");
        assert_eq!(cfg.avb_params.props.len(), 3);
        assert!(cfg.firehose_loader.is_none());
        assert!(cfg.patched_boot_img.is_none());
    }

    #[test]
    fn test_config_json_uses_snake_case_and_nulls() {
        let mut cfg = AppConfig::default();
        cfg.firehose_loader = Some(PathBuf::from("/a/loader.elf"));

        let json: serde_json::Value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["firehose_loader"], "/a/loader.elf");
        assert!(json["patched_boot_img"].is_null());
        assert_eq!(json["avb_params"]["partition_size"], 100663296);
    }

    #[test]
    fn test_config_without_avb_params_gets_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{"firehose_loader": "/l.elf"}"#).unwrap();
        assert_eq!(cfg.firehose_loader, Some(PathBuf::from("/l.elf")));
        assert!(cfg.stock_boot_img.is_none());
        assert_eq!(cfg.avb_params, AvbParams::default());
    }

    #[test]
    fn test_merge_leaves_untouched_fields() {
        let base = AppConfig::default().merged(
            &PartialAppConfig::new()
                .set(ConfigField::FirehoseLoader, "/a/loader.elf")
                .set(ConfigField::StockBootImg, "/a/stock.img"),
        );

        let next = base.merged(&PartialAppConfig::new().set(ConfigField::PatchedBootImg, "/a/boot.img"));

        assert_eq!(next.firehose_loader, Some(PathBuf::from("/a/loader.elf")));
        assert_eq!(next.stock_boot_img, Some(PathBuf::from("/a/stock.img")));
        assert_eq!(next.patched_boot_img, Some(PathBuf::from("/a/boot.img")));
    }

    #[test]
    fn test_merge_can_clear_a_field() {
        let base = AppConfig::default()
            .merged(&PartialAppConfig::new().set(ConfigField::GptMainBin, "/g/main.bin"));
        let next = base.merged(&PartialAppConfig::new().clear(ConfigField::GptMainBin));
        assert!(next.gpt_main_bin.is_none());
    }

    #[test]
    fn test_avb_params_patch_replaces_whole_record() {
        let base = AppConfig::default();
        let replacement = AvbParams {
            salt: "00ff".to_string(),
            partition_name: String::new(),
            partition_size: 0,
            algorithm: String::new(),
            rollback_index: 0,
            props: Vec::new(),
        };

        let next = base.merged(&PartialAppConfig::new().avb_params(replacement.clone()));

        assert_eq!(next.avb_params, replacement);
        assert!(next.avb_params.props.is_empty());
        assert_ne!(next.avb_params.partition_name, "boot");
    }

    #[test]
    fn test_later_patch_entry_for_same_field_wins() {
        let patch = PartialAppConfig::new()
            .set(ConfigField::AvbKeyPath, "/k/old.pem")
            .set(ConfigField::AvbKeyPath, "/k/new.pem");
        assert_eq!(patch.fields().count(), 1);

        let next = AppConfig::default().merged(&patch);
        assert_eq!(next.avb_key_path, Some(PathBuf::from("/k/new.pem")));
    }

    #[test]
    fn test_config_field_parse() {
        assert_eq!(
            "patched_boot_img".parse::<ConfigField>().unwrap(),
            ConfigField::PatchedBootImg
        );
        assert_eq!(
            "avb-key-path".parse::<ConfigField>().unwrap(),
            ConfigField::AvbKeyPath
        );
        assert!("boot".parse::<ConfigField>().is_err());
    }

    #[test]
    fn test_file_filter_accepts_extension_case_insensitive() {
        let filter = ConfigField::PatchedBootImg.filter();
        assert!(filter.accepts(Path::new("/a/boot.img")));
        assert!(filter.accepts(Path::new("/a/BOOT.IMG")));
        assert!(!filter.accepts(Path::new("/a/boot.bin")));
        assert!(!filter.accepts(Path::new("/a/boot")));
    }
}
