//! Console settings for GeekFlash
//!
//! Supports:
//! - `<config dir>/geekflash/settings.toml` - backend tools, device polling, log buffering

pub mod settings;
pub mod types;

pub use settings::{default_config_dir, init_settings, load_settings, save_settings, settings_path};
pub use types::*;
