//! Console command runner
//!
//! Builds the local backend and orchestrator from the console settings and
//! drives one command to completion, reporting everything as
//! [`HeadlessEvent`]s. The orchestrator-level helpers are generic over the
//! backend so they run unchanged against a scripted one.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geekflash_app::config::{self, Settings};
use geekflash_app::{missing_inputs, FilePicker, Orchestrator, PathArgPicker};
use geekflash_backend::{
    default_data_dir, probe_device, ConfigPersistence, DevicePoller, EventBus, FlashBackend,
    LocalBackend, ToolAvailability,
};
use geekflash_core::prelude::*;
use geekflash_core::{
    AppConfig, AvbParams, CommandResult, ConfigField, FileFilter, Operation, PartialAppConfig,
};

use super::HeadlessEvent;

/// Resolved directories and settings for one invocation
#[derive(Debug, Clone)]
pub struct Console {
    config_dir: PathBuf,
    data_dir: PathBuf,
    settings: Settings,
}

impl Console {
    /// Use the platform directories unless overridden
    pub fn new(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(config::default_config_dir);
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let settings = config::load_settings(&config_dir);
        debug!(
            "Console: config_dir={} data_dir={}",
            config_dir.display(),
            data_dir.display()
        );
        Self {
            config_dir,
            data_dir,
            settings,
        }
    }

    fn orchestrator(&self) -> Orchestrator<LocalBackend> {
        let bus = EventBus::new();
        let backend = LocalBackend::new(
            ConfigPersistence::new(&self.data_dir),
            self.settings.backend.command_options(),
            self.settings.backend.command_timeout(),
            &bus,
        );
        Orchestrator::new(Arc::new(backend), bus, self.settings.logs.capacity())
    }

    /// One-shot USB probe
    pub async fn status(&self) -> Result<()> {
        match probe_device().await {
            Ok(status) => {
                HeadlessEvent::device_status(&status).emit();
                Ok(())
            }
            Err(e) => Err(report(e)),
        }
    }

    /// Stream device status and backend output until Ctrl-C
    pub async fn watch(&self) -> Result<()> {
        let orch = self.orchestrator();
        let result = async {
            start(&orch).await?;
            let poller = DevicePoller::spawn(
                orch.bus().device_status.clone(),
                self.settings.device.poll_interval(),
            );
            follow(&orch, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Interrupted");
            })
            .await;
            poller.shutdown().await;
            Ok::<_, Error>(())
        }
        .await;
        orch.shutdown().await;
        result
    }

    pub async fn show_config(&self) -> Result<()> {
        let orch = self.orchestrator();
        let result = start(&orch).await.map(|_| ());
        orch.shutdown().await;
        result
    }

    pub async fn set_field(&self, field: ConfigField, path: &Path) -> Result<()> {
        let orch = self.orchestrator();
        let result = async {
            start(&orch).await?;
            set_field(&orch, field, path).await.map(|_| ())
        }
        .await;
        orch.shutdown().await;
        result
    }

    pub async fn unset_field(&self, field: ConfigField) -> Result<()> {
        let orch = self.orchestrator();
        let result = async {
            start(&orch).await?;
            unset_field(&orch, field).await.map(|_| ())
        }
        .await;
        orch.shutdown().await;
        result
    }

    pub async fn edit_avb<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut AvbParams) + Send,
    {
        let orch = self.orchestrator();
        let result = async {
            start(&orch).await?;
            edit_avb(&orch, edit).await.map(|_| ())
        }
        .await;
        orch.shutdown().await;
        result
    }

    pub async fn run(&self, operation: Operation) -> Result<()> {
        let orch = self.orchestrator();
        let result = async {
            start(&orch).await?;
            run_operation(&orch, operation).await.map(|_| ())
        }
        .await;
        orch.shutdown().await;
        result
    }

    /// Check that every configured program resolves on `PATH`
    pub fn doctor(&self) -> Result<()> {
        let tools = ToolAvailability::check(&self.settings.backend.command_options());
        let missing = tools
            .missing()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        HeadlessEvent::tools(tools).emit();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ToolNotFound {
                tool: missing.join(", "),
            })
        }
    }

    /// Write a commented `settings.toml` unless one exists
    pub fn init(&self) -> Result<()> {
        let created = config::init_settings(&self.config_dir).map_err(report)?;
        HeadlessEvent::settings_initialized(&config::settings_path(&self.config_dir), created)
            .emit();
        Ok(())
    }
}

/// Emit `e` as an error event and hand it back
fn report(e: Error) -> Error {
    HeadlessEvent::error(e.to_string(), e.is_fatal()).emit();
    e
}

fn emit_config<B>(orch: &Orchestrator<B>, config: &AppConfig)
where
    B: FlashBackend + Sync,
{
    HeadlessEvent::config(config).emit();
    HeadlessEvent::readiness(orch.readiness()).emit();
}

/// Persist failures do not fail the command; the value is kept in memory
fn emit_persist_error<B>(orch: &Orchestrator<B>)
where
    B: FlashBackend + Sync,
{
    if let Some(e) = orch.config().last_persist_error() {
        HeadlessEvent::error(format!("Configuration not saved: {}", e), false).emit();
    }
}

/// Start `orch` and report the loaded configuration
pub async fn start<B>(orch: &Orchestrator<B>) -> Result<AppConfig>
where
    B: FlashBackend + Sync,
{
    let config = orch.start().await.map_err(report)?;
    emit_config(orch, &config);
    Ok(config)
}

/// Picker that reports why a path was refused
struct ReportingPicker {
    field: ConfigField,
    inner: PathArgPicker,
}

impl FilePicker for ReportingPicker {
    fn pick(&self, filter: &FileFilter) -> Option<PathBuf> {
        match self.inner.check(filter) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Selection rejected: {}", e);
                let path = self.inner.candidate();
                HeadlessEvent::selection_rejected(self.field, path, e.to_string()).emit();
                None
            }
        }
    }
}

/// Select `path` for `field`; a refused path leaves the field unchanged
pub async fn set_field<B>(
    orch: &Orchestrator<B>,
    field: ConfigField,
    path: &Path,
) -> Result<AppConfig>
where
    B: FlashBackend + Sync,
{
    let picker = ReportingPicker {
        field,
        inner: PathArgPicker::new(path),
    };
    match orch.select_file(field, &picker).await? {
        Some(config) => {
            emit_persist_error(orch);
            emit_config(orch, &config);
            Ok(config)
        }
        None => Err(Error::invalid_selection(
            path,
            format!("{} left unchanged", field),
        )),
    }
}

pub async fn unset_field<B>(orch: &Orchestrator<B>, field: ConfigField) -> Result<AppConfig>
where
    B: FlashBackend + Sync,
{
    let config = orch.apply(PartialAppConfig::new().clear(field)).await?;
    emit_persist_error(orch);
    emit_config(orch, &config);
    Ok(config)
}

pub async fn edit_avb<B, F>(orch: &Orchestrator<B>, edit: F) -> Result<AppConfig>
where
    B: FlashBackend + Sync,
    F: FnOnce(&mut AvbParams) + Send,
{
    let config = orch.config().update_avb_params(edit).await?;
    emit_persist_error(orch);
    emit_config(orch, &config);
    Ok(config)
}

/// Run `operation`, forwarding backend output as it arrives
pub async fn run_operation<B>(
    orch: &Orchestrator<B>,
    operation: Operation,
) -> Result<CommandResult>
where
    B: FlashBackend + Sync,
{
    let missing = missing_inputs(orch.config().current().as_ref(), operation);
    if !missing.is_empty() {
        return Err(report(Error::Precondition { operation, missing }));
    }

    // A private receiver: everything emitted before `run` returns is queued here
    let mut lines = orch.bus().log_lines.subscribe();
    HeadlessEvent::operation_started(operation).emit();

    let run = orch.run(operation);
    tokio::pin!(run);
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome,
            Some(line) = lines.recv() => HeadlessEvent::log(&line).emit(),
        }
    };
    while let Ok(line) = lines.try_recv() {
        HeadlessEvent::log(&line).emit();
    }

    match &outcome {
        Ok(result) => HeadlessEvent::operation_completed(operation, *result).emit(),
        Err(e @ Error::OperationFailed { exit_code, .. }) => {
            HeadlessEvent::operation_failed(operation, Some(*exit_code), e.to_string()).emit()
        }
        Err(e @ Error::OperationInProgress { .. }) => {
            HeadlessEvent::error(e.to_string(), false).emit()
        }
        Err(e) => HeadlessEvent::operation_failed(operation, None, e.to_string()).emit(),
    }
    outcome
}

/// Mirror device status and buffered log lines until `stop` resolves
pub async fn follow<B>(orch: &Orchestrator<B>, stop: impl Future<Output = ()>)
where
    B: FlashBackend + Sync,
{
    let mut devices = orch.devices().watch();
    let mut revision = orch.logs().watch_revision();
    let mut last_seq = 0;

    HeadlessEvent::device_status(&orch.devices().current()).emit();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = devices.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *devices.borrow_and_update();
                HeadlessEvent::device_status(&status).emit();
            }
            changed = revision.changed() => {
                if changed.is_err() {
                    break;
                }
                for entry in orch.logs().lines_since(last_seq) {
                    last_seq = entry.seq;
                    HeadlessEvent::log(&entry.line).emit();
                }
            }
        }
    }
}
