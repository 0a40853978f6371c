//! Locations of the external tools the broker drives.

use std::path::{Path, PathBuf};

use crate::volume::FileSystem;

/// Default path of the `rbd` binary.
pub const DEFAULT_RBD_PATH: &str = "/usr/bin/rbd";

/// Default directory holding the `mkfs.*` formatters.
pub const DEFAULT_MKFS_DIR: &str = "/sbin";

/// Paths of the external tools used by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// The `rbd` command-line tool.
    pub rbd: PathBuf,
    /// Directory containing `mkfs.<filesystem>` binaries.
    pub mkfs_dir: PathBuf,
}

impl ToolPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom `rbd` binary.
    #[must_use]
    pub fn with_rbd(mut self, rbd: impl Into<PathBuf>) -> Self {
        self.rbd = rbd.into();
        self
    }

    /// Use a custom formatter directory.
    #[must_use]
    pub fn with_mkfs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mkfs_dir = dir.into();
        self
    }

    /// The `rbd` binary.
    #[must_use]
    pub fn rbd(&self) -> &Path {
        &self.rbd
    }

    /// Formatter binary for a filesystem.
    #[must_use]
    pub fn formatter(&self, file_system: FileSystem) -> PathBuf {
        self.mkfs_dir.join(file_system.formatter())
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            rbd: PathBuf::from(DEFAULT_RBD_PATH),
            mkfs_dir: PathBuf::from(DEFAULT_MKFS_DIR),
        }
    }
}
