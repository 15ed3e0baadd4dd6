//! The flashing backend command surface
//!
//! [`FlashBackend`] is the RPC facade the orchestrator talks to. The local
//! implementation persists configuration to disk and drives `fastboot`, `edl`
//! and `avbtool` as child processes.

use std::path::Path;
use std::time::Duration;

use geekflash_core::prelude::*;
use geekflash_core::{AppConfig, AvbParams, CommandResult};

use crate::commands::{
    build_fix_gpt_commands, build_flash_boot_commands, build_sign_avb_commands, CommandOptions,
};
use crate::executor::CommandExecutor;
use crate::feed::EventBus;
use crate::persistence::ConfigPersistence;

/// Backend commands.
///
/// Operation commands return the last executed command's result: a non-zero
/// exit is a normal `Ok` result. `Err` means the backend could not complete
/// the invocation at all (missing tool, timeout, spawn failure).
#[trait_variant::make(FlashBackend: Send)]
pub trait LocalFlashBackend {
    /// Load the persisted configuration (default when none was saved)
    async fn load_config(&self) -> Result<AppConfig>;

    /// Durably store the configuration
    async fn save_config(&self, config: &AppConfig) -> Result<()>;

    async fn flash_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult>;

    async fn restore_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult>;

    async fn fix_gpt_slot(
        &self,
        gpt_main: &Path,
        gpt_backup: &Path,
        loader: &Path,
    ) -> Result<CommandResult>;

    async fn sign_avb(
        &self,
        boot_img: &Path,
        avbtool_path: &Path,
        key_path: &Path,
        params: &AvbParams,
    ) -> Result<CommandResult>;
}

/// Process-driven backend running on this machine
#[derive(Debug, Clone)]
pub struct LocalBackend {
    persistence: ConfigPersistence,
    executor: CommandExecutor,
    options: CommandOptions,
}

impl LocalBackend {
    /// Build a backend that streams command output onto `bus.log_lines`
    pub fn new(
        persistence: ConfigPersistence,
        options: CommandOptions,
        timeout: Duration,
        bus: &EventBus,
    ) -> Self {
        Self {
            persistence,
            executor: CommandExecutor::new(bus.log_lines.clone(), timeout),
            options,
        }
    }
}

impl FlashBackend for LocalBackend {
    async fn load_config(&self) -> Result<AppConfig> {
        let persistence = self.persistence.clone();
        tokio::task::spawn_blocking(move || persistence.load())
            .await
            .map_err(|e| Error::persistence(format!("load task failed: {}", e)))?
            .context("Failed to load flashing config")
    }

    async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let persistence = self.persistence.clone();
        let path = persistence.path();
        let config = config.clone();
        tokio::task::spawn_blocking(move || persistence.save(&config))
            .await
            .map_err(|e| Error::persistence(format!("save task failed: {}", e)))?
            .with_context(|| format!("Failed to save {}", path.display()))
    }

    async fn flash_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult> {
        info!("Flashing {} with loader {}", boot_img.display(), loader.display());
        let commands = build_flash_boot_commands(&self.options, boot_img, loader);
        self.executor.execute_sequence(&commands).await
    }

    async fn restore_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult> {
        info!("Restoring {} with loader {}", boot_img.display(), loader.display());
        let commands = build_flash_boot_commands(&self.options, boot_img, loader);
        self.executor.execute_sequence(&commands).await
    }

    async fn fix_gpt_slot(
        &self,
        gpt_main: &Path,
        gpt_backup: &Path,
        loader: &Path,
    ) -> Result<CommandResult> {
        info!(
            "Writing GPT main={} backup={} lun={}",
            gpt_main.display(),
            gpt_backup.display(),
            self.options.gpt_lun
        );
        let commands = build_fix_gpt_commands(&self.options, gpt_main, gpt_backup, loader);
        self.executor.execute_sequence(&commands).await
    }

    async fn sign_avb(
        &self,
        boot_img: &Path,
        avbtool_path: &Path,
        key_path: &Path,
        params: &AvbParams,
    ) -> Result<CommandResult> {
        info!(
            "Signing {} ({} props, algorithm {})",
            boot_img.display(),
            params.props.len(),
            params.algorithm
        );
        let commands =
            build_sign_avb_commands(&self.options, boot_img, avbtool_path, key_path, params);
        self.executor.execute_sequence(&commands).await
    }
}
