mod cli;
mod commands;
mod config;
mod dispatch;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "dwarfmem=info",
        1 => "dwarfmem=debug",
        _ => "dwarfmem=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Configure {
            layout_dir,
            connect_unknown,
            show,
        } => {
            commands::configure::handle(layout_dir, connect_unknown, show)?;
        }

        Commands::Layouts => {
            commands::layouts::list(&Config::load()?)?;
        }

        Commands::AddLayout { version, file } => {
            commands::layouts::add(&version, &file)?;
        }

        command => {
            let config = Config::load()?;
            run_live(&config, cli.force, command)?;
        }
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn run_live(config: &Config, force: bool, command: Commands) -> Result<()> {
    let mut df = commands::connect(config, force)?;
    dispatch::live(&mut df, command)
}

#[cfg(not(target_os = "linux"))]
fn run_live(_config: &Config, _force: bool, _command: Commands) -> Result<()> {
    anyhow::bail!("Live process access is only supported on Linux")
}
