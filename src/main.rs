//! GeekFlash - EDL flashing console
//!
//! This is the binary entry point. All logic lives in the library.

use clap::Parser;

use geekflash::cli::{Args, Command, ConfigCommand};
use geekflash::Console;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    geekflash_core::logging::init(args.data_dir.as_deref())?;

    let console = Console::new(args.config_dir, args.data_dir);

    match args.command {
        Command::Status => console.status().await?,
        Command::Watch => console.watch().await?,
        Command::Config(ConfigCommand::Show) => console.show_config().await?,
        Command::Config(ConfigCommand::Set { field, path }) => {
            console.set_field(field, &path).await?
        }
        Command::Config(ConfigCommand::Unset { field }) => console.unset_field(field).await?,
        Command::Config(ConfigCommand::Avb(edit)) => {
            console.edit_avb(move |params| edit.apply(params)).await?
        }
        Command::Run { operation } => console.run(operation).await?,
        Command::Doctor => console.doctor()?,
        Command::Init => console.init()?,
    }

    tracing::info!("GeekFlash exiting");
    Ok(())
}
