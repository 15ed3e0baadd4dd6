//! # geekflash-core - Core Domain Types
//!
//! Foundation crate for GeekFlash. Provides the flashing configuration model,
//! event payloads, operation identifiers, error handling and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Configuration (`types`)
//! - [`AppConfig`] - Artifact paths plus AVB signing parameters
//! - [`AvbParams`], [`AvbProp`] - AVB hash footer record
//! - [`PartialAppConfig`] - Top-level patch; `avb_params` replaces wholesale
//! - [`ConfigField`] - The seven path fields, with picker filters
//!
//! ### Events (`events`)
//! - [`DeviceStatus`], [`DeviceMode`] - `device-status` feed payload
//! - [`LogLine`], [`LogStreamKind`] - `log-line` feed payload
//!
//! ### Operations (`operation`)
//! - [`Operation`] - Flash Boot, Restore Boot, Fix GPT Slot, Sign AVB
//! - [`CommandResult`] - Exit code and duration of a backend invocation
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use geekflash_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod operation;
pub mod types;

/// Prelude for common imports used throughout all GeekFlash crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{
    DeviceMode, DeviceStatus, LogLine, LogStreamKind, DEVICE_STATUS_EVENT, LOG_LINE_EVENT,
};
pub use operation::{CommandResult, Operation};
pub use types::{AppConfig, AvbParams, AvbProp, ConfigField, FileFilter, PartialAppConfig};
