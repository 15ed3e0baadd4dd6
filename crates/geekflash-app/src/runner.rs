//! Operation runner
//!
//! Dispatches one of the four operations to the backend and tracks its
//! lifecycle (`idle -> running -> succeeded | failed`). At most one operation
//! is in flight across all four: the in-flight token lives in the runner's
//! mutex and is held by an RAII guard for the duration of the backend call.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;

use geekflash_backend::FlashBackend;
use geekflash_core::prelude::*;
use geekflash_core::{AppConfig, CommandResult, ConfigField, Operation};

use crate::validator::{missing_inputs, validate};

/// Detail recorded when a running invocation is dropped before completing
pub const ABANDONED_DETAIL: &str = "invocation abandoned";

/// Lifecycle state of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Running,
    Succeeded(CommandResult),
    Failed {
        /// `None` when the backend could not be invoked
        result: Option<CommandResult>,
        detail: String,
    },
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded(_) | OperationState::Failed { .. }
        )
    }
}

/// Point-in-time view of every operation's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunnerSnapshot {
    pub in_flight: Option<Operation>,
    pub states: BTreeMap<Operation, OperationState>,
}

impl RunnerSnapshot {
    pub fn state(&self, operation: Operation) -> OperationState {
        self.states.get(&operation).cloned().unwrap_or_default()
    }
}

#[derive(Clone)]
struct Shared {
    inner: Arc<Mutex<RunnerSnapshot>>,
    tx: Arc<watch::Sender<RunnerSnapshot>>,
}

impl Shared {
    fn update<R>(&self, f: impl FnOnce(&mut RunnerSnapshot) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let out = f(&mut inner);
        self.tx.send_replace(inner.clone());
        out
    }
}

/// Holds the in-flight token; records a terminal state when finished or dropped
struct InFlightGuard {
    shared: Shared,
    operation: Operation,
    finished: bool,
}

impl InFlightGuard {
    fn finish(mut self, state: OperationState) {
        self.release(state);
        self.finished = true;
    }

    fn release(&self, state: OperationState) {
        let operation = self.operation;
        self.shared.update(|s| {
            s.states.insert(operation, state);
            if s.in_flight == Some(operation) {
                s.in_flight = None;
            }
        });
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("{} was abandoned while running", self.operation);
            self.release(OperationState::Failed {
                result: None,
                detail: ABANDONED_DETAIL.to_string(),
            });
        }
    }
}

pub struct OperationRunner<B> {
    backend: Arc<B>,
    shared: Shared,
}

impl<B> OperationRunner<B>
where
    B: FlashBackend + Sync,
{
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, _rx) = watch::channel(RunnerSnapshot::default());
        Self {
            backend,
            shared: Shared {
                inner: Arc::new(Mutex::new(RunnerSnapshot::default())),
                tx: Arc::new(tx),
            },
        }
    }

    /// Run `operation` with the paths from `config`.
    ///
    /// Errors:
    /// - `Precondition`: a required input is unset; the backend is not called
    ///   and no state changes
    /// - `OperationInProgress`: another operation holds the token
    /// - `OperationFailed`: the backend reported a non-zero exit
    /// - `BackendInvocation`: the backend could not run the operation
    pub async fn run(
        &self,
        operation: Operation,
        config: Option<&AppConfig>,
    ) -> Result<CommandResult> {
        let config = match config {
            Some(config) if validate(Some(config)).allows(operation) => config,
            _ => {
                return Err(Error::Precondition {
                    operation,
                    missing: missing_inputs(config, operation),
                })
            }
        };

        let guard = self.begin(operation)?;
        info!("{} started", operation);

        match self.invoke(operation, config).await {
            Ok(result) if result.is_success() => {
                info!("{} succeeded in {}ms", operation, result.duration_ms);
                guard.finish(OperationState::Succeeded(result));
                Ok(result)
            }
            Ok(result) => {
                warn!("{} failed with exit code {}", operation, result.exit_code);
                guard.finish(OperationState::Failed {
                    result: Some(result),
                    detail: format!("exit code {}", result.exit_code),
                });
                Err(Error::OperationFailed {
                    operation,
                    exit_code: result.exit_code,
                    duration_ms: result.duration_ms,
                })
            }
            Err(e) => {
                error!("{} could not be invoked: {}", operation, e);
                let detail = e.to_string();
                guard.finish(OperationState::Failed {
                    result: None,
                    detail: detail.clone(),
                });
                Err(Error::backend_invocation(operation, detail))
            }
        }
    }

    /// Take the in-flight token and reset `operation` to running
    fn begin(&self, operation: Operation) -> Result<InFlightGuard> {
        self.shared.update(|s| match s.in_flight {
            Some(running) => Err(Error::OperationInProgress {
                requested: operation,
                running,
            }),
            None => {
                s.in_flight = Some(operation);
                s.states.insert(operation, OperationState::Running);
                Ok(())
            }
        })?;

        Ok(InFlightGuard {
            shared: self.shared.clone(),
            operation,
            finished: false,
        })
    }

    async fn invoke(&self, operation: Operation, config: &AppConfig) -> Result<CommandResult> {
        let backend = &self.backend;
        match operation {
            Operation::FlashBoot => {
                backend
                    .flash_boot(
                        required(config, operation, ConfigField::PatchedBootImg)?,
                        required(config, operation, ConfigField::FirehoseLoader)?,
                    )
                    .await
            }
            Operation::RestoreBoot => {
                backend
                    .restore_boot(
                        required(config, operation, ConfigField::StockBootImg)?,
                        required(config, operation, ConfigField::FirehoseLoader)?,
                    )
                    .await
            }
            Operation::FixGptSlot => {
                backend
                    .fix_gpt_slot(
                        required(config, operation, ConfigField::GptMainBin)?,
                        required(config, operation, ConfigField::GptBackupBin)?,
                        required(config, operation, ConfigField::FirehoseLoader)?,
                    )
                    .await
            }
            Operation::SignAvb => {
                backend
                    .sign_avb(
                        required(config, operation, ConfigField::PatchedBootImg)?,
                        required(config, operation, ConfigField::AvbtoolPath)?,
                        required(config, operation, ConfigField::AvbKeyPath)?,
                        &config.avb_params,
                    )
                    .await
            }
        }
    }

    pub fn state(&self, operation: Operation) -> OperationState {
        self.snapshot().state(operation)
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.snapshot().in_flight
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        self.shared.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RunnerSnapshot> {
        self.shared.tx.subscribe()
    }
}

fn required(config: &AppConfig, operation: Operation, field: ConfigField) -> Result<&Path> {
    config.field(field).ok_or_else(|| Error::Precondition {
        operation,
        missing: vec![field],
    })
}
