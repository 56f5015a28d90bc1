//! Jail update orchestration: expand a statement list into a plan and
//! apply it.

use std::path::Path;

use anyhow::{Context, Result};

use crate::action::{apply_statement, ApplyOptions};
use crate::loader::{self, LoaderConfig};
use crate::spec::{expand_lexical, Statement};

/// Options for a full jail update.
#[derive(Default)]
pub struct UpdateOptions {
    pub apply: ApplyOptions,
    /// Skip shared-library resolution for copied files.
    pub skip_dependencies: bool,
}

/// Expand a statement list and fold in the shared libraries every copied
/// file needs.
///
/// Runs the lexical expansion first so targets are settled, resolves each
/// regular file's imports, appends a copy statement per library with the
/// attributes of the statement that pulled it in, then expands once more
/// to deduplicate and re-sort.
pub fn expand_with_dependencies(
    stmts: Vec<Statement>,
    loader: &LoaderConfig,
) -> Result<Vec<Statement>> {
    let expanded = expand_lexical(stmts);
    let mut with_deps = expanded.clone();
    for stmt in &expanded {
        let Statement::RegularFile { source, attr, .. } = stmt else {
            continue;
        };
        let deps = loader::imported_libraries(source, loader).with_context(|| {
            format!("failed to resolve libraries for {}", source.display())
        })?;
        for dep in deps {
            with_deps.push(Statement::RegularFile {
                source: dep.clone(),
                target: dep,
                attr: *attr,
            });
        }
    }
    Ok(expand_lexical(with_deps))
}

/// Produce the final execution plan for a statement list.
pub fn build_plan(
    stmts: Vec<Statement>,
    loader: &LoaderConfig,
    skip_dependencies: bool,
) -> Result<Vec<Statement>> {
    if skip_dependencies {
        Ok(expand_lexical(stmts))
    } else {
        expand_with_dependencies(stmts, loader)
    }
}

/// Create or update the jail at `jail` from `stmts`, returning the number
/// of statements applied.
///
/// Statements run strictly in plan order; the first failure aborts the
/// update and leaves everything applied so far in place.
pub fn update_jail(
    jail: &Path,
    stmts: Vec<Statement>,
    loader: &LoaderConfig,
    options: &UpdateOptions,
) -> Result<usize> {
    let plan = build_plan(stmts, loader, options.skip_dependencies)?;
    for stmt in &plan {
        apply_statement(jail, stmt, &options.apply)
            .with_context(|| format!("failed to apply: {stmt}"))?;
    }
    Ok(plan.len())
}
