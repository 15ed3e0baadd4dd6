//! Command-line arguments

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use geekflash_core::{AvbParams, AvbProp, ConfigField, Operation};

/// GeekFlash - EDL flashing console
#[derive(Parser, Debug)]
#[command(name = "geekflash", version)]
#[command(
    about = "Flash boot images, repair GPT and sign AVB footers over Qualcomm EDL",
    long_about = None
)]
pub struct Args {
    /// Directory holding settings.toml
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory holding the persisted flashing configuration
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe USB once and print the device mode
    Status,

    /// Stream device status and backend output until Ctrl-C
    Watch,

    /// Show or edit the flashing configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Run an operation: flash-boot, restore-boot, fix-gpt, sign-avb
    Run {
        #[arg(value_name = "OPERATION")]
        operation: Operation,
    },

    /// Check that edl, fastboot, python and sudo are installed
    Doctor,

    /// Write a default settings.toml
    Init,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the configuration and which operations are ready
    Show,

    /// Select an artifact file
    Set {
        #[arg(value_name = "FIELD")]
        field: ConfigField,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Clear an artifact path
    Unset {
        #[arg(value_name = "FIELD")]
        field: ConfigField,
    },

    /// Edit the AVB hash footer parameters
    Avb(AvbArgs),
}

#[derive(ClapArgs, Debug, Default, Clone)]
pub struct AvbArgs {
    /// Start from the built-in defaults
    #[arg(long)]
    pub reset: bool,

    #[arg(long)]
    pub partition_name: Option<String>,

    #[arg(long)]
    pub partition_size: Option<u64>,

    #[arg(long)]
    pub algorithm: Option<String>,

    #[arg(long)]
    pub rollback_index: Option<u64>,

    #[arg(long)]
    pub salt: Option<String>,

    /// Replace the property list; repeat for several (`key:value`)
    #[arg(long = "prop", value_name = "KEY:VALUE", value_parser = parse_prop)]
    pub props: Vec<AvbProp>,

    /// Drop every property
    #[arg(long, conflicts_with = "props")]
    pub clear_props: bool,
}

impl AvbArgs {
    /// Apply the given flags to `params`; untouched flags keep their values
    pub fn apply(self, params: &mut AvbParams) {
        if self.reset {
            *params = AvbParams::default();
        }
        if let Some(name) = self.partition_name {
            params.partition_name = name;
        }
        if let Some(size) = self.partition_size {
            params.partition_size = size;
        }
        if let Some(algorithm) = self.algorithm {
            params.algorithm = algorithm;
        }
        if let Some(index) = self.rollback_index {
            params.rollback_index = index;
        }
        if let Some(salt) = self.salt {
            params.salt = salt;
        }
        if self.clear_props {
            params.props.clear();
        } else if !self.props.is_empty() {
            params.props = self.props;
        }
    }
}

/// Parse `key:value`, splitting at the first colon
pub fn parse_prop(s: &str) -> Result<AvbProp, String> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => Ok(AvbProp::new(key.trim(), value)),
        _ => Err(format!("expected KEY:VALUE, got '{}'", s)),
    }
}
