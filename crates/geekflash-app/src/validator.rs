//! Action validator: per-operation readiness derived from the configuration

use serde::Serialize;

use geekflash_core::{AppConfig, ConfigField, Operation};

/// One flag per operation; derived, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessFlags {
    pub can_flash_boot: bool,
    pub can_restore_boot: bool,
    pub can_fix_gpt: bool,
    pub can_sign_avb: bool,
}

impl ReadinessFlags {
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::FlashBoot => self.can_flash_boot,
            Operation::RestoreBoot => self.can_restore_boot,
            Operation::FixGptSlot => self.can_fix_gpt,
            Operation::SignAvb => self.can_sign_avb,
        }
    }

    /// Operations currently allowed, in display order
    pub fn ready_operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.allows(*op))
            .collect()
    }
}

fn ready(config: &AppConfig, operation: Operation) -> bool {
    operation
        .required_fields()
        .iter()
        .all(|field| config.is_set(*field))
}

/// Compute readiness; no configuration means nothing is ready
pub fn validate(config: Option<&AppConfig>) -> ReadinessFlags {
    let Some(config) = config else {
        return ReadinessFlags::default();
    };

    ReadinessFlags {
        can_flash_boot: ready(config, Operation::FlashBoot),
        can_restore_boot: ready(config, Operation::RestoreBoot),
        can_fix_gpt: ready(config, Operation::FixGptSlot),
        can_sign_avb: ready(config, Operation::SignAvb),
    }
}

/// Required fields of `operation` that are unset
pub fn missing_inputs(config: Option<&AppConfig>, operation: Operation) -> Vec<ConfigField> {
    operation
        .required_fields()
        .iter()
        .copied()
        .filter(|field| !config.is_some_and(|c| c.is_set(*field)))
        .collect()
}
