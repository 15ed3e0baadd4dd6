//! Test utilities for code that drives a [`FlashBackend`]
//!
//! [`ScriptedBackend`] is an in-memory backend that records every call,
//! returns scripted results and can hold an operation "in flight" until the
//! test releases it.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, Semaphore};

use geekflash_core::prelude::*;
use geekflash_core::{
    AppConfig, AvbParams, CommandResult, ConfigField, LogLine, Operation, PartialAppConfig,
};

use crate::backend::FlashBackend;
use crate::feed::EventBus;

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    LoadConfig,
    SaveConfig(AppConfig),
    FlashBoot {
        boot_img: PathBuf,
        loader: PathBuf,
    },
    RestoreBoot {
        boot_img: PathBuf,
        loader: PathBuf,
    },
    FixGptSlot {
        gpt_main: PathBuf,
        gpt_backup: PathBuf,
        loader: PathBuf,
    },
    SignAvb {
        boot_img: PathBuf,
        avbtool_path: PathBuf,
        key_path: PathBuf,
        params: AvbParams,
    },
}

impl BackendCall {
    /// The operation this call belongs to, if it is an operation call
    pub fn operation(&self) -> Option<Operation> {
        match self {
            BackendCall::FlashBoot { .. } => Some(Operation::FlashBoot),
            BackendCall::RestoreBoot { .. } => Some(Operation::RestoreBoot),
            BackendCall::FixGptSlot { .. } => Some(Operation::FixGptSlot),
            BackendCall::SignAvb { .. } => Some(Operation::SignAvb),
            BackendCall::LoadConfig | BackendCall::SaveConfig(_) => None,
        }
    }
}

/// Scripted outcome of one operation call
#[derive(Debug, Clone)]
pub enum Outcome {
    Exit(i32),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    stored: Option<AppConfig>,
    load_error: Option<String>,
    save_error: Option<String>,
    outcomes: HashMap<Operation, VecDeque<Outcome>>,
    calls: Vec<BackendCall>,
    log_lines: Vec<LogLine>,
}

/// In-memory [`FlashBackend`] for tests
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    bus: Option<EventBus>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Backend with no stored config (loads the default) where every operation exits 0
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            bus: None,
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Config returned by `load_config`
    pub fn with_config(self, config: AppConfig) -> Self {
        self.script().stored = Some(config);
        self
    }

    /// Make `load_config` fail with a persistence error
    pub fn with_load_error(self, message: impl Into<String>) -> Self {
        self.script().load_error = Some(message.into());
        self
    }

    /// Make `save_config` fail (or succeed again with `None`)
    pub fn set_save_error(&self, message: Option<&str>) {
        self.script().save_error = message.map(str::to_string);
    }

    /// Clear a scripted load failure
    pub fn clear_load_error(&self) {
        self.script().load_error = None;
    }

    /// Queue the outcome of the next call of `op`. Unscripted calls exit 0.
    pub fn push_outcome(&self, op: Operation, outcome: Outcome) {
        self.script().outcomes.entry(op).or_default().push_back(outcome);
    }

    /// Publish these lines on `bus.log_lines` during every operation call
    pub fn with_log_lines(mut self, bus: &EventBus, lines: Vec<LogLine>) -> Self {
        self.script().log_lines = lines;
        self.bus = Some(bus.clone());
        self
    }

    /// Hold every operation call until [`Self::release`] is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one gated operation call complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Resolve once an operation call has been entered
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.script().calls.clone()
    }

    /// Operation calls only, in order
    pub fn operation_calls(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation().is_some())
            .collect()
    }

    /// The config last written by `save_config`
    pub fn stored_config(&self) -> Option<AppConfig> {
        self.script().stored.clone()
    }

    pub fn save_count(&self) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| matches!(c, BackendCall::SaveConfig(_)))
            .count()
    }

    async fn run_operation(&self, op: Operation, call: BackendCall) -> Result<CommandResult> {
        let (outcome, lines) = {
            let mut script = self.script();
            script.calls.push(call);
            let outcome = script
                .outcomes
                .get_mut(&op)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Outcome::Exit(0));
            (outcome, script.log_lines.clone())
        };

        self.entered.notify_one();

        if let Some(bus) = &self.bus {
            for line in lines {
                bus.log_lines.emit(line);
            }
        }

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| Error::ChannelClosed)?;
            permit.forget();
        }

        match outcome {
            Outcome::Exit(code) => Ok(CommandResult::new(code, 10)),
            Outcome::Fail(message) => Err(Error::process(message)),
        }
    }
}

impl FlashBackend for ScriptedBackend {
    async fn load_config(&self) -> Result<AppConfig> {
        let mut script = self.script();
        script.calls.push(BackendCall::LoadConfig);
        if let Some(message) = &script.load_error {
            return Err(Error::persistence(message.clone()));
        }
        Ok(script.stored.clone().unwrap_or_default())
    }

    async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let mut script = self.script();
        script.calls.push(BackendCall::SaveConfig(config.clone()));
        if let Some(message) = &script.save_error {
            return Err(Error::persistence(message.clone()));
        }
        script.stored = Some(config.clone());
        Ok(())
    }

    async fn flash_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult> {
        let call = BackendCall::FlashBoot {
            boot_img: boot_img.to_path_buf(),
            loader: loader.to_path_buf(),
        };
        self.run_operation(Operation::FlashBoot, call).await
    }

    async fn restore_boot(&self, boot_img: &Path, loader: &Path) -> Result<CommandResult> {
        let call = BackendCall::RestoreBoot {
            boot_img: boot_img.to_path_buf(),
            loader: loader.to_path_buf(),
        };
        self.run_operation(Operation::RestoreBoot, call).await
    }

    async fn fix_gpt_slot(
        &self,
        gpt_main: &Path,
        gpt_backup: &Path,
        loader: &Path,
    ) -> Result<CommandResult> {
        let call = BackendCall::FixGptSlot {
            gpt_main: gpt_main.to_path_buf(),
            gpt_backup: gpt_backup.to_path_buf(),
            loader: loader.to_path_buf(),
        };
        self.run_operation(Operation::FixGptSlot, call).await
    }

    async fn sign_avb(
        &self,
        boot_img: &Path,
        avbtool_path: &Path,
        key_path: &Path,
        params: &AvbParams,
    ) -> Result<CommandResult> {
        let call = BackendCall::SignAvb {
            boot_img: boot_img.to_path_buf(),
            avbtool_path: avbtool_path.to_path_buf(),
            key_path: key_path.to_path_buf(),
            params: params.clone(),
        };
        self.run_operation(Operation::SignAvb, call).await
    }
}

/// Fixture path for a field, e.g. `/fixtures/firehose_loader.elf`
pub fn fixture_path(field: ConfigField) -> PathBuf {
    let ext = field.filter().extensions[0];
    PathBuf::from(format!("/fixtures/{}.{}", field.as_str(), ext))
}

/// A config with every path field set to its fixture path
pub fn full_config() -> AppConfig {
    config_with(&ConfigField::ALL)
}

/// A default config with only `fields` set to fixture paths
pub fn config_with(fields: &[ConfigField]) -> AppConfig {
    let patch = fields
        .iter()
        .fold(PartialAppConfig::new(), |p, f| p.set(*f, fixture_path(*f)));
    AppConfig::default().merged(&patch)
}
