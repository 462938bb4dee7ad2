//! Layout registry: every valid layout found on disk, keyed by checksum

use super::MemoryLayout;
use crate::error::LayoutError;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Per-OS layout subdirectory name
pub fn layout_subdir() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

/// Canonical install directory, relative to the working directory
pub fn canonical_layout_dir() -> PathBuf {
    Path::new("etc").join("memory_layouts").join(layout_subdir())
}

/// Directories searched at startup: the working directory, then the
/// canonical layout directory
pub fn default_search_paths() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    vec![cwd, canonical_layout_dir()]
}

/// File name for an installed layout: `"v0.31.25 (linux)"` becomes
/// `"v0.31.25_linux.toml"`
pub fn sanitize_file_name(version: &str) -> String {
    let name: String = version
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    format!("{}.toml", name)
}

/// All loaded layouts
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    layouts: HashMap<String, MemoryLayout>,
    install_dir: PathBuf,
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self {
            layouts: HashMap::new(),
            install_dir: canonical_layout_dir(),
        }
    }
}

impl LayoutRegistry {
    /// Empty registry installing new layouts into `install_dir`
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            layouts: HashMap::new(),
            install_dir: install_dir.into(),
        }
    }

    /// Load every valid layout from `paths`. Finding none is an error.
    pub fn discover(paths: &[PathBuf]) -> Result<Self, LayoutError> {
        let mut registry = Self::default();

        tracing::debug!("Searching for memory layouts in {} directories", paths.len());
        for path in paths {
            registry.load_dir(path);
        }

        if registry.is_empty() {
            let searched: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            return Err(LayoutError::NoValidLayouts(searched.join(", ")));
        }

        Ok(registry)
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Load the `*.toml` files directly inside `dir`, in reverse name order.
    /// Returns how many valid layouts were added.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        tracing::trace!("scanning {}", dir.display());

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|ext| ext == "toml").unwrap_or(false))
            .collect();
        files.sort();
        files.reverse();

        let mut added = 0;
        for file in files {
            match MemoryLayout::from_file(&file) {
                Ok(layout) if layout.is_valid() => {
                    if self.insert(layout) {
                        added += 1;
                    }
                }
                Ok(_) => tracing::trace!("skipping {} (not a layout)", file.display()),
                Err(e) => tracing::debug!("skipping {}: {}", file.display(), e),
            }
        }
        added
    }

    /// Insert a valid layout; returns false for invalid ones
    pub fn insert(&mut self, layout: MemoryLayout) -> bool {
        if !layout.is_valid() {
            return false;
        }
        tracing::debug!(
            "adding valid layout {} {}",
            layout.game_version(),
            layout.checksum()
        );
        self.layouts.insert(layout.checksum(), layout);
        true
    }

    /// Case-insensitive lookup
    pub fn get(&self, checksum: &str) -> Option<&MemoryLayout> {
        self.layouts.get(&checksum.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn layouts(&self) -> impl Iterator<Item = &MemoryLayout> {
        self.layouts.values()
    }

    /// `(version, checksum)` pairs sorted by version
    pub fn supported_versions(&self) -> Vec<(String, String)> {
        let mut versions: Vec<(String, String)> = self
            .layouts
            .values()
            .map(|l| (l.game_version().to_string(), l.checksum()))
            .collect();
        versions.sort();
        versions
    }

    /// Copy an externally supplied layout into the install directory under a
    /// name derived from `version`, then load it.
    pub fn add_new_layout(&mut self, version: &str, file: &Path) -> Result<PathBuf, LayoutError> {
        if !file.exists() {
            tracing::warn!("Layout file {} does not exist!", file.display());
            return Err(LayoutError::Missing(file.to_path_buf()));
        }

        std::fs::create_dir_all(&self.install_dir).map_err(|source| LayoutError::Io {
            path: self.install_dir.clone(),
            source,
        })?;
        let target = self.install_dir.join(sanitize_file_name(version));

        tracing::debug!("Copying {} to {}", file.display(), target.display());
        std::fs::copy(file, &target).map_err(|source| LayoutError::Io {
            path: target.clone(),
            source,
        })?;

        let layout = MemoryLayout::from_file(&target)?;
        if !self.insert(layout) {
            return Err(LayoutError::Invalid(target));
        }
        Ok(target)
    }
}
