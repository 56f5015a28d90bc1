//! Plan command - shows the expanded execution plan without touching
//! the filesystem.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::commands::build::parse_spec_files;
use crate::config::Config;
use crate::loader::LoaderConfig;
use crate::manifest::PlanManifest;
use crate::update::build_plan;

/// Execute the plan command.
pub fn cmd_plan(
    spec_files: &[PathBuf],
    skip_dependencies: bool,
    json: bool,
    output: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let stmts = parse_spec_files(spec_files)?;
    let loader = LoaderConfig::from_file(&config.ld_config)?;
    let plan = build_plan(stmts, &loader, skip_dependencies)?;

    if let Some(path) = output {
        PlanManifest::from_plan(&plan).save(path)?;
        println!(
            "Wrote plan manifest: {} ({} entries)",
            path.display(),
            plan.len()
        );
        return Ok(());
    }

    if json {
        println!("{}", PlanManifest::from_plan(&plan).to_json()?);
    } else {
        for stmt in &plan {
            println!("{stmt}");
        }
    }
    Ok(())
}
