//! Loader search-path configuration parsing.
//!
//! Reads `/etc/ld.so.conf`-style files: one search directory per line, blank
//! lines and `#` comments ignored, `include <glob>` lines expanded and parsed
//! recursively. A missing or unreadable top-level file yields an empty path
//! list rather than an error, so hosts without a loader config still work.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Maximum `include` nesting depth, mirroring the spec-file guard.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Parse a loader configuration file into a list of search directories.
pub fn parse_ld_config(conf: &Path) -> Result<Vec<PathBuf>> {
    parse_at_depth(conf, 0)
}

fn parse_at_depth(conf: &Path, depth: usize) -> Result<Vec<PathBuf>> {
    if depth > MAX_INCLUDE_DEPTH {
        bail!(
            "loader config include nesting level too deep: {}",
            conf.display()
        );
    }

    let Ok(content) = fs::read_to_string(conf) else {
        return Ok(Vec::new());
    };

    let mut paths = Vec::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(pattern) = line.strip_prefix("include ") {
            let Ok(matches) = glob::glob(pattern.trim()) else {
                continue;
            };
            for entry in matches.flatten() {
                paths.extend(parse_at_depth(&entry, depth + 1)?);
            }
        } else {
            // only the first token counts, anything after a space is junk
            let dir = match line.split_once(' ') {
                Some((first, _)) => first,
                None => line,
            };
            paths.push(PathBuf::from(dir));
        }
    }
    Ok(paths)
}
