//! Flashing operations and their results

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::ConfigField;

/// One of the four mutually exclusive operations the console can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    FlashBoot,
    RestoreBoot,
    #[serde(rename = "fix-gpt")]
    FixGptSlot,
    SignAvb,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::FlashBoot,
        Operation::RestoreBoot,
        Operation::FixGptSlot,
        Operation::SignAvb,
    ];

    /// Stable identifier used on the command line and in NDJSON output
    pub fn id(&self) -> &'static str {
        match self {
            Operation::FlashBoot => "flash-boot",
            Operation::RestoreBoot => "restore-boot",
            Operation::FixGptSlot => "fix-gpt",
            Operation::SignAvb => "sign-avb",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Operation::FlashBoot => "Flash Boot",
            Operation::RestoreBoot => "Restore Boot",
            Operation::FixGptSlot => "Fix GPT Slot",
            Operation::SignAvb => "Sign AVB",
        }
    }

    /// Path fields that must be set before this operation can run.
    ///
    /// Sign AVB also forwards `avb_params`, which always holds a value.
    pub fn required_fields(&self) -> &'static [ConfigField] {
        match self {
            Operation::FlashBoot => &[ConfigField::PatchedBootImg, ConfigField::FirehoseLoader],
            Operation::RestoreBoot => &[ConfigField::StockBootImg, ConfigField::FirehoseLoader],
            Operation::FixGptSlot => &[
                ConfigField::GptMainBin,
                ConfigField::GptBackupBin,
                ConfigField::FirehoseLoader,
            ],
            Operation::SignAvb => &[
                ConfigField::PatchedBootImg,
                ConfigField::AvbtoolPath,
                ConfigField::AvbKeyPath,
            ],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "flash-boot" => Ok(Operation::FlashBoot),
            "restore-boot" => Ok(Operation::RestoreBoot),
            "fix-gpt" | "fix-gpt-slot" => Ok(Operation::FixGptSlot),
            "sign-avb" => Ok(Operation::SignAvb),
            _ => Err(Error::UnknownOperation {
                name: s.to_string(),
            }),
        }
    }
}

/// Outcome of one completed backend command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn new(exit_code: i32, duration_ms: u64) -> Self {
        Self {
            exit_code,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
