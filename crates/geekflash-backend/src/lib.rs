//! # geekflash-backend - Flashing Backend
//!
//! The command surface the orchestrator dispatches to, and its local
//! implementation: configuration persistence, `fastboot`/`edl`/`avbtool`
//! command sequences, USB device-mode detection and the two event feeds.
//!
//! Depends on [`geekflash_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Backend
//! - [`FlashBackend`] - Async RPC facade (`load_config`, `save_config`, four operations)
//! - [`LocalBackend`] - Process-driven implementation
//!
//! ### Command Execution
//! - [`CommandSpec`], [`CommandOptions`] - Command sequences and their tool settings
//! - [`CommandExecutor`] - Runs sequences, streams output as log lines
//!
//! ### Event Feeds
//! - [`EventBus`] - `device-status` and `log-line` feeds
//! - [`EventFeed`] - Ordered fan-out to subscribers
//!
//! ### Devices
//! - [`parse_device_mode()`] - Classify a USB listing
//! - [`probe_device()`] - One-shot probe
//! - [`DevicePoller`] - Interval probe publishing mode changes
//!
//! ### Persistence and Tools
//! - [`ConfigPersistence`] - Atomic, locked `config.json` store
//! - [`ToolAvailability`] - `PATH` resolution of the external tools

pub mod backend;
pub mod commands;
pub mod devices;
pub mod executor;
pub mod feed;
pub mod persistence;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_availability;

pub use backend::{FlashBackend, LocalBackend};
pub use commands::{
    build_fix_gpt_commands, build_flash_boot_commands, build_sign_avb_commands, CommandOptions,
    CommandSpec,
};
pub use devices::{parse_device_mode, probe_device, DevicePoller, DEFAULT_POLL_INTERVAL};
pub use executor::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT};
pub use feed::{EventBus, EventFeed};
pub use persistence::{default_data_dir, ConfigPersistence};
pub use tool_availability::{ToolAvailability, ToolStatus};
