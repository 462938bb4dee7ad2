//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up dwarfmem defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Handle the configure command
///
/// # Arguments
/// * `layout_dir` - Directory to add to the layout search path
/// * `connect_unknown` - Whether to stay connected to unknown versions
/// * `show` - If true, show current configuration
pub fn handle(layout_dir: Option<PathBuf>, connect_unknown: Option<bool>, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if layout_dir.is_none() && connect_unknown.is_none() {
        show_usage();
        return Ok(());
    }

    if apply(&mut config, layout_dir, connect_unknown) {
        config.save()?;
        if let Ok(path) = Config::config_path() {
            println!("Config saved to: {}", path.display());
        }
    } else {
        println!("Nothing changed");
    }

    Ok(())
}

/// Apply the requested changes; returns whether anything changed
fn apply(config: &mut Config, layout_dir: Option<PathBuf>, connect_unknown: Option<bool>) -> bool {
    let mut changed = false;

    if let Some(dir) = layout_dir {
        if config.add_layout_dir(dir.clone()) {
            println!("Layout directory added: {}", dir.display());
            changed = true;
        }
    }

    if let Some(value) = connect_unknown {
        if config.connect_unknown != value {
            config.connect_unknown = value;
            println!("Connect to unknown versions: {}", value);
            changed = true;
        }
    }

    changed
}

/// Display current configuration
fn show_config(config: &Config) {
    if config.layout_dirs.is_empty() {
        println!("No extra layout directories configured");
    } else {
        println!("Layout directories:");
        for dir in &config.layout_dirs {
            println!("  {}", dir.display());
        }
    }
    println!("Connect to unknown versions: {}", config.connect_unknown);
    println!("Remap interval: {}s", config.engine.remap_interval_secs);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: dwarfmem configure --layout-dir DIR");
    println!("   or: dwarfmem configure --connect-unknown true");
    println!("   or: dwarfmem configure --show");
}
