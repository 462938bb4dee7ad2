//! Configuration management for the dwarfmem CLI

use anyhow::{Context, Result};
use dwarfmem::EngineOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Extra directories searched for layout files, before the defaults
    #[serde(default)]
    pub layout_dirs: Vec<PathBuf>,

    /// Stay connected when the running version has no layout
    #[serde(default)]
    pub connect_unknown: bool,

    #[serde(default)]
    pub engine: EngineOptions,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("dwarfmem");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Configured layout directories followed by the built-in search paths
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.layout_dirs.clone();
        paths.extend(dwarfmem::default_search_paths());
        paths
    }

    /// Add a layout directory unless it is already configured
    pub fn add_layout_dir(&mut self, dir: PathBuf) -> bool {
        if self.layout_dirs.contains(&dir) {
            return false;
        }
        self.layout_dirs.push(dir);
        true
    }
}
