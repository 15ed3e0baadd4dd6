//! # geekflash-app - Flash Orchestrator
//!
//! The stateful layer between the operator and the flashing backend.
//!
//! Depends on [`geekflash_core`] for domain types and on
//! [`geekflash_backend`] for the backend trait and event feeds.
//!
//! ## Public API
//!
//! ### Orchestrator
//! - [`Orchestrator`] - Owns every component below, wired to one backend
//!
//! ### Components
//! - [`ConfigStore`] - Single live `AppConfig`, write-through persistence
//! - [`validate()`], [`ReadinessFlags`] - Per-operation readiness
//! - [`DeviceStatusMonitor`] - Latest `device-status` event
//! - [`LogStream`] - Ordered, clearable `log-line` buffer
//! - [`OperationRunner`], [`OperationState`] - One operation at a time
//! - [`Subscription`] - Feed listener with deterministic teardown
//!
//! ### Boundaries
//! - [`FilePicker`], [`PathArgPicker`] - Artifact selection
//! - [`config`] - Console settings (`settings.toml`)

pub mod config;
pub mod config_store;
pub mod device_monitor;
pub mod file_picker;
pub mod log_stream;
pub mod orchestrator;
pub mod runner;
pub mod subscription;
pub mod validator;

pub use config::Settings;
pub use config_store::ConfigStore;
pub use device_monitor::DeviceStatusMonitor;
pub use file_picker::{CancelledPicker, FilePicker, PathArgPicker};
pub use log_stream::{LogStream, SequencedLine};
pub use orchestrator::Orchestrator;
pub use runner::{OperationRunner, OperationState, RunnerSnapshot, ABANDONED_DETAIL};
pub use subscription::Subscription;
pub use validator::{missing_inputs, validate, ReadinessFlags};
