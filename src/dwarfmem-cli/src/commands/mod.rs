//! Command handlers for the dwarfmem CLI

pub mod configure;
pub mod layouts;
pub mod memory;
pub mod records;
pub mod scan;

use crate::config::Config;
use anyhow::Result;
use dwarfmem::{LayoutRegistry, ProgressEvent};

#[cfg(target_os = "linux")]
use anyhow::Context;
#[cfg(target_os = "linux")]
use dwarfmem::{NativeDriver, ProcessInstance};

/// Load layouts from the configured search path. With `force` an empty
/// registry is acceptable.
pub fn load_layouts(config: &Config, force: bool) -> Result<LayoutRegistry> {
    match LayoutRegistry::discover(&config.search_paths()) {
        Ok(registry) => Ok(registry),
        Err(e) if force => {
            tracing::warn!("{}", e);
            Ok(LayoutRegistry::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Find the running game and select its layout
#[cfg(target_os = "linux")]
pub fn connect(config: &Config, force: bool) -> Result<ProcessInstance<NativeDriver>> {
    let layouts = load_layouts(config, force)?;
    let mut df = ProcessInstance::with_options(NativeDriver::new(), layouts, config.engine.clone());
    df.set_progress(report);

    df.find_running_copy(force || config.connect_unknown)
        .context("Could not connect to Dwarf Fortress")?;
    Ok(df)
}

/// Progress sink for terminal use
pub fn report(event: ProgressEvent) {
    match event {
        ProgressEvent::ScanMessage(message) | ProgressEvent::ProgressMessage(message) => {
            tracing::info!("{}", message);
        }
        ProgressEvent::ConnectionInterrupted => {
            tracing::warn!("Connection to Dwarf Fortress interrupted");
        }
        ProgressEvent::LayoutNotFound { checksum, supported } => {
            eprintln!("No memory layout for this Dwarf Fortress (checksum {})", checksum);
            eprintln!("Supported versions:");
            for (version, checksum) in supported {
                eprintln!("  {:<30} {}", version, checksum);
            }
            eprintln!("Install one with: dwarfmem add-layout <VERSION> <FILE>");
        }
        ProgressEvent::ScanTotalSteps(_)
        | ProgressEvent::ScanProgress(_)
        | ProgressEvent::ProgressRange(..)
        | ProgressEvent::ProgressValue(_) => {}
    }
}
