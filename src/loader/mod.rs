//! Dynamic-loader emulation: find the shared libraries a binary needs.
//!
//! The jail update path runs every copied file through here so that a spec
//! naming `/bin/sh` pulls in libc and the program interpreter without the
//! spec author listing them. Resolution follows the host's dynamic linker
//! closely enough for chroot purposes, not bug for bug.

pub mod elf;
pub mod ldconfig;
pub mod macho;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use ldconfig::parse_ld_config;

// ============================================================================
// Loader configuration
// ============================================================================

/// Search paths the resolver consults, typically parsed from
/// `/etc/ld.so.conf`.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    search_dirs: Vec<PathBuf>,
}

impl LoaderConfig {
    /// Build a configuration from a loader config file. A missing file
    /// yields an empty search path, not an error.
    pub fn from_file(conf: &Path) -> Result<Self> {
        Ok(LoaderConfig {
            search_dirs: parse_ld_config(conf)?,
        })
    }

    /// Build a configuration from an explicit list of directories.
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        LoaderConfig { search_dirs: dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }
}

// ============================================================================
// Platform dispatch
// ============================================================================

/// Resolve the shared libraries `binary` needs, transitively.
///
/// Non-executable files resolve to an empty list, so callers can feed every
/// jail entry through without checking file types first.
#[cfg(not(target_os = "macos"))]
pub fn imported_libraries(binary: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    elf::imported_libraries(binary, config.search_dirs())
}

/// Resolve the shared libraries `binary` needs, transitively.
///
/// Mach-O install names are absolute paths, so the configured search
/// directories are not consulted on this platform.
#[cfg(target_os = "macos")]
pub fn imported_libraries(binary: &Path, _config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    macho::imported_libraries(binary)
}
