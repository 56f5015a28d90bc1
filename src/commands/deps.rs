//! Deps command - lists the shared libraries binaries need.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::loader::{self, LoaderConfig};

/// Execute the deps command.
pub fn cmd_deps(binaries: &[PathBuf], config: &Config) -> Result<()> {
    let loader = LoaderConfig::from_file(&config.ld_config)?;

    for binary in binaries {
        let deps = loader::imported_libraries(binary, &loader)
            .with_context(|| format!("failed to resolve {}", binary.display()))?;

        println!("{}:", binary.display());
        if deps.is_empty() {
            println!("  (no shared libraries)");
            continue;
        }
        for dep in &deps {
            println!("  {}", dep.display());
        }
    }
    Ok(())
}
