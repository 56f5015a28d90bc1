//! Build command - creates or updates a jail tree from spec files.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::action::ApplyOptions;
use crate::config::Config;
use crate::copy::Reflink;
use crate::loader::LoaderConfig;
use crate::spec::{self, Statement};
use crate::update::{update_jail, UpdateOptions};

/// Options for the build command.
pub struct BuildOptions {
    /// Retry file copies after removing a destination that cannot be opened.
    pub force: bool,
    /// Remove each existing destination file before copying.
    pub remove_destination: bool,
    pub reflink: Reflink,
    /// Skip shared-library resolution.
    pub skip_dependencies: bool,
    /// Explain what is being done.
    pub verbose: bool,
}

/// Execute the build command.
pub fn cmd_build(
    jail_dir: &Path,
    spec_files: &[PathBuf],
    options: &BuildOptions,
    config: &Config,
) -> Result<()> {
    println!("=== Building jail {} ===\n", jail_dir.display());
    let start = Instant::now();

    if options.verbose {
        config.print();
        println!();
    }

    // 1. Parse every spec file in command-line order
    let stmts = parse_spec_files(spec_files)?;
    println!(
        "Parsed {} statement(s) from {} spec file(s)",
        stmts.len(),
        spec_files.len()
    );

    // 2. Resolve loader search paths once, up front
    let loader = LoaderConfig::from_file(&config.ld_config)?;

    // 3. Expand and apply
    let update = UpdateOptions {
        apply: ApplyOptions {
            force: options.force,
            remove_destination: options.remove_destination,
            reflink: options.reflink,
            buffer_size: config.copy_buffer,
            verbose: options.verbose,
        },
        skip_dependencies: options.skip_dependencies,
    };
    let applied = update_jail(jail_dir, stmts, &loader, &update)?;

    println!(
        "\n=== Jail updated: {} statement(s) applied in {:.1}s ===",
        applied,
        start.elapsed().as_secs_f32()
    );
    Ok(())
}

/// Parse spec files and concatenate their statements in order.
pub fn parse_spec_files(spec_files: &[PathBuf]) -> Result<Vec<Statement>> {
    let mut stmts = Vec::new();
    for file in spec_files {
        stmts.extend(spec::parse(file)?);
    }
    Ok(stmts)
}
