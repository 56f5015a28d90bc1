//! Lexical expansion of statement lists.
//!
//! Expansion closes a raw statement list over its ancestor directories,
//! drops duplicate targets, and orders the result into an executable plan:
//! directories first, then files, devices, and links, with `run` statements
//! last. Running it on its own output changes nothing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{Statement, DEFAULT_DIR_MODE};

/// Expand `stmts` into a closed, ordered plan.
///
/// Duplicate targets are dropped (the first occurrence wins, whatever its
/// kind), missing ancestor directories are synthesized down to the jail
/// root, and the result is stably sorted into execution order. Synthesized
/// directories inherit the attributes of the statement that required them,
/// except that a `RegularFile` without an explicit mode contributes the
/// default directory mode rather than "unspecified". `run` statements pass
/// through untouched and keep their relative order at the end of the plan.
pub fn expand_lexical(stmts: Vec<Statement>) -> Vec<Statement> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut expanded = Vec::with_capacity(stmts.len() + stmts.len() / 2);

    for stmt in stmts {
        let Some(target) = stmt.target().map(Path::to_path_buf) else {
            // only `run` has no target; it is never deduplicated
            expanded.push(stmt);
            continue;
        };
        if !seen.insert(target.clone()) {
            continue;
        }

        let mut inherited = stmt.file_attr().copied().unwrap_or_default();
        if matches!(stmt, Statement::RegularFile { .. }) && inherited.mode.is_none() {
            inherited.mode = Some(DEFAULT_DIR_MODE);
        }
        expanded.push(stmt);

        let mut next = parent_dir(&target);
        while let Some(dir) = next {
            if !seen.insert(dir.clone()) {
                break;
            }
            next = parent_dir(&dir);
            expanded.push(Statement::Directory {
                target: dir,
                attr: inherited,
            });
        }
    }

    expanded.sort_by(|a, b| a.plan_cmp(b));
    expanded
}

fn parent_dir(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => Some(p.to_path_buf()),
        _ => None,
    }
}
