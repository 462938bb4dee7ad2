//! Memory layouts
//!
//! A layout maps symbolic field names ("creature_vector", "squad_vector", ...)
//! to addresses inside one specific build of the game. Layouts are keyed by
//! the checksum of that build's executable and loaded from TOML files:
//!
//! ```toml
//! [info]
//! checksum = "0x7f6b0b9c"
//! version_name = "v0.31.25 (linux)"
//! complete = true
//!
//! [addresses]
//! creature_vector = 0x093f5a28
//! dwarf_race_index = 0x093c42e4
//! squad_vector = 0xffffffff   # not supported by this build
//!
//! [dwarf_offsets]
//! race = 0x8c
//! ```

mod registry;

pub use registry::{
    canonical_layout_dir, default_search_paths, layout_subdir, sanitize_file_name, LayoutRegistry,
};

use crate::error::LayoutError;
use crate::VirtAddr;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sentinel address meaning "field not supported by this version"
pub const UNSUPPORTED: VirtAddr = 0xFFFF_FFFF;

/// The `[info]` table of a layout file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutInfo {
    #[serde(default)]
    pub checksum: String,
    #[serde(default, rename = "version_name")]
    pub version: String,
    /// Every field the engine needs is populated
    #[serde(default)]
    pub complete: bool,
    /// Load address of the reference build, used for address correction
    #[serde(default)]
    pub base_address: Option<VirtAddr>,
}

#[derive(Debug, Deserialize)]
struct LayoutFile {
    #[serde(default)]
    info: LayoutInfo,
    #[serde(default)]
    addresses: BTreeMap<String, VirtAddr>,
    #[serde(default)]
    offsets: BTreeMap<String, VirtAddr>,
    #[serde(default)]
    dwarf_offsets: BTreeMap<String, VirtAddr>,
    #[serde(default)]
    squad_offsets: BTreeMap<String, VirtAddr>,
}

/// One loaded layout table. Immutable after loading.
#[derive(Debug, Clone)]
pub struct MemoryLayout {
    path: PathBuf,
    info: LayoutInfo,
    addresses: BTreeMap<String, VirtAddr>,
    offsets: BTreeMap<String, VirtAddr>,
    dwarf_offsets: BTreeMap<String, VirtAddr>,
    squad_offsets: BTreeMap<String, VirtAddr>,
}

impl MemoryLayout {
    /// Load a layout from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Parse layout text; `path` is only recorded for reporting
    pub fn from_toml_str(contents: &str, path: impl Into<PathBuf>) -> Result<Self, LayoutError> {
        let path = path.into();
        let file: LayoutFile = toml::from_str(contents).map_err(|source| LayoutError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            info: file.info,
            addresses: file.addresses,
            offsets: file.offsets,
            dwarf_offsets: file.dwarf_offsets,
            squad_offsets: file.squad_offsets,
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.info.checksum.trim().is_empty() && !self.info.version.trim().is_empty()
    }

    /// Lower-cased checksum, the registry key
    pub fn checksum(&self) -> String {
        self.info.checksum.trim().to_lowercase()
    }

    pub fn game_version(&self) -> &str {
        &self.info.version
    }

    pub fn is_complete(&self) -> bool {
        self.info.complete
    }

    pub fn base_address(&self) -> Option<VirtAddr> {
        self.info.base_address
    }

    pub fn filename(&self) -> &Path {
        &self.path
    }

    /// Raw address for `name`, or [`UNSUPPORTED`] if the layout lacks it
    pub fn address(&self, name: &str) -> VirtAddr {
        self.addresses.get(name).copied().unwrap_or(UNSUPPORTED)
    }

    /// False when the field is missing or set to the sentinel
    pub fn is_supported(&self, name: &str) -> bool {
        self.address(name) != UNSUPPORTED
    }

    pub fn offset(&self, name: &str) -> Option<VirtAddr> {
        self.offsets.get(name).copied()
    }

    pub fn dwarf_offset(&self, name: &str) -> Option<VirtAddr> {
        self.dwarf_offsets.get(name).copied()
    }

    pub fn squad_offset(&self, name: &str) -> Option<VirtAddr> {
        self.squad_offsets.get(name).copied()
    }

    pub fn addresses(&self) -> impl Iterator<Item = (&str, VirtAddr)> {
        self.addresses.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const SAMPLE: &str = r#"
[info]
checksum = "0xDEADBEEF"
version_name = "v0.31.25 (test)"
complete = true
base_address = 0x8048000

[addresses]
creature_vector = 0x1000
dwarf_race_index = 0x1100
squad_vector = 0xffffffff

[dwarf_offsets]
race = 0x8c
"#;

    #[test]
    fn test_parse_layout() {
        let layout = MemoryLayout::from_toml_str(SAMPLE, "sample.toml").unwrap();
        assert!(layout.is_valid());
        assert!(layout.is_complete());
        assert_eq!(layout.checksum(), "0xdeadbeef");
        assert_eq!(layout.game_version(), "v0.31.25 (test)");
        assert_eq!(layout.base_address(), Some(0x8048000));
        assert_eq!(layout.address("creature_vector"), 0x1000);
        assert_eq!(layout.dwarf_offset("race"), Some(0x8c));
        assert_eq!(layout.squad_offset("name"), None);
    }

    #[test]
    fn test_unsupported_fields() {
        let layout = MemoryLayout::from_toml_str(SAMPLE, "sample.toml").unwrap();
        assert!(!layout.is_supported("squad_vector"));
        assert_eq!(layout.address("squad_vector"), UNSUPPORTED);
        assert_eq!(layout.address("nonexistent"), UNSUPPORTED);
        assert!(layout.is_supported("creature_vector"));
    }

    #[test]
    fn test_layout_without_checksum_is_invalid() {
        let layout =
            MemoryLayout::from_toml_str("[info]\nversion_name = \"x\"\n", "bad.toml").unwrap();
        assert!(!layout.is_valid());
        assert!(!layout.is_complete());
    }

    #[test]
    fn test_layout_parse_error() {
        let err = MemoryLayout::from_toml_str("[info\n", "broken.toml").unwrap_err();
        assert!(matches!(err, LayoutError::Parse { .. }));
    }
}
