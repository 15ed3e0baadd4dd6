//! The flash orchestrator
//!
//! Owns one instance of each component and wires them to a backend handle and
//! its event bus. Constructed explicitly; there is no global instance.

use std::sync::Arc;

use geekflash_backend::{EventBus, FlashBackend};
use geekflash_core::prelude::*;
use geekflash_core::{AppConfig, CommandResult, ConfigField, Operation, PartialAppConfig};

use crate::config_store::ConfigStore;
use crate::device_monitor::DeviceStatusMonitor;
use crate::file_picker::FilePicker;
use crate::log_stream::LogStream;
use crate::runner::OperationRunner;
use crate::validator::{validate, ReadinessFlags};

pub struct Orchestrator<B> {
    bus: EventBus,
    config: ConfigStore<B>,
    devices: DeviceStatusMonitor,
    logs: LogStream,
    runner: OperationRunner<B>,
}

impl<B> Orchestrator<B>
where
    B: FlashBackend + Sync,
{
    /// `log_capacity` of `None` keeps every log line
    pub fn new(backend: Arc<B>, bus: EventBus, log_capacity: Option<usize>) -> Self {
        Self {
            bus,
            config: ConfigStore::new(Arc::clone(&backend)),
            devices: DeviceStatusMonitor::new(),
            logs: LogStream::new(log_capacity),
            runner: OperationRunner::new(backend),
        }
    }

    /// Subscribe to both feeds, then load the configuration.
    ///
    /// A load failure is returned but leaves the orchestrator running with
    /// every operation disabled until [`ConfigStore::reload`] succeeds.
    pub async fn start(&self) -> Result<AppConfig> {
        self.devices.start(&self.bus.device_status);
        self.logs.start(&self.bus.log_lines);
        self.config.load().await
    }

    pub fn config(&self) -> &ConfigStore<B> {
        &self.config
    }

    pub fn devices(&self) -> &DeviceStatusMonitor {
        &self.devices
    }

    pub fn logs(&self) -> &LogStream {
        &self.logs
    }

    pub fn runner(&self) -> &OperationRunner<B> {
        &self.runner
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn readiness(&self) -> ReadinessFlags {
        validate(self.config.current().as_ref())
    }

    pub async fn apply(&self, patch: PartialAppConfig) -> Result<AppConfig> {
        self.config.apply(patch).await
    }

    /// Ask `picker` for a file for `field`.
    ///
    /// Returns `Ok(None)` and changes nothing when the picker yields nothing.
    pub async fn select_file(
        &self,
        field: ConfigField,
        picker: &(impl FilePicker + Sync),
    ) -> Result<Option<AppConfig>> {
        let Some(path) = picker.pick(&field.filter()) else {
            debug!("No file selected for {}", field);
            return Ok(None);
        };

        info!("Selected {} for {}", path.display(), field);
        self.config
            .apply(PartialAppConfig::new().set(field, path))
            .await
            .map(Some)
    }

    /// Run `operation` against the current configuration
    pub async fn run(&self, operation: Operation) -> Result<CommandResult> {
        let config = self.config.current();
        self.runner.run(operation, config.as_ref()).await
    }

    /// Tear down both subscriptions
    pub async fn shutdown(&self) {
        self.devices.shutdown().await;
        self.logs.shutdown().await;
        debug!("Orchestrator shut down");
    }
}
