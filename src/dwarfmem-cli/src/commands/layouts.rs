//! Layout listing and installation

use crate::config::Config;
use anyhow::{Context, Result};
use dwarfmem::LayoutRegistry;
use std::path::Path;

/// Print every loaded layout
pub fn list(config: &Config) -> Result<()> {
    let registry = LayoutRegistry::discover(&config.search_paths())?;
    print_registry(&registry);
    Ok(())
}

fn print_registry(registry: &LayoutRegistry) {
    let mut layouts: Vec<_> = registry.layouts().collect();
    layouts.sort_by(|a, b| a.game_version().cmp(b.game_version()));

    println!("{:<30} {:<12} {:<9} FILE", "VERSION", "CHECKSUM", "COMPLETE");
    for layout in layouts {
        println!(
            "{:<30} {:<12} {:<9} {}",
            layout.game_version(),
            layout.checksum(),
            if layout.is_complete() { "yes" } else { "no" },
            layout.filename().display()
        );
    }
    println!("{} layouts", registry.len());
}

/// Install `file` as the layout for `version`
pub fn add(version: &str, file: &Path) -> Result<()> {
    let mut registry = LayoutRegistry::default();
    install(&mut registry, version, file)
}

fn install(registry: &mut LayoutRegistry, version: &str, file: &Path) -> Result<()> {
    let installed = registry
        .add_new_layout(version, file)
        .with_context(|| format!("Failed to install layout {}", file.display()))?;
    println!("Installed {} as {}", version, installed.display());
    Ok(())
}
