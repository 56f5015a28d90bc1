//! Line-oriented spec-file grammar.
//!
//! One statement per line; blank lines and `#` comments are skipped. Forms
//! are tried in order (directives, links, directories, devices, regular
//! files) and the first match wins. A line matching no form is an error with
//! file and line context.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use super::{DeviceType, FileAttr, Statement, DEFAULT_DIR_MODE};

/// Maximum `include` nesting depth.
pub const MAX_INCLUDE_DEPTH: usize = 8;

// Directives:
//   include /some/file
//   run echo 'test'
static DIRECTIVES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(include|run)\s+(.+)$").unwrap());

// Links:
//   /path/symlink_name -> /bin/bash
//   /path/hardlink => /bin/bash
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\s*(->|=>)\s*(.+)$").unwrap());

// Directories:
//   /some/dir/
//   /var/lib/{all,of,these}/
//   /home/user/ 600
static DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^{]+)(?:\{([^}]+)\})?(.*)/(?:\s+(\d+))?$").unwrap());

// Device files:
//   /dev/null c 1 3 666
//   /dev/console c 5 1
static DEV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\s+([cbups])\s+(\d+)\s+(\d+)(?:\s+(\d+))?$").unwrap());

// Regular files:
//   /bin/bash              copy to /bin/bash, original permissions
//   /bin/dash /bin/sh      copy to /bin/sh, original permissions
//   /usr/bin/python 755    file mode 755
//   /tmp/cache755 /755     file named "/755" in the jail
//   /tmp/cache755 755 755  file named "755" in the jail, mode 755
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(?:\s+(.+?))?(?:\s+(\d+))?$").unwrap());

/// Parse a spec file into statements, resolving `include` directives
/// relative to the including file's directory.
pub fn parse(path: impl AsRef<Path>) -> Result<Vec<Statement>> {
    parse_from_file(path.as_ref(), 0)
}

fn parse_from_file(path: &Path, include_depth: usize) -> Result<Vec<Statement>> {
    if include_depth > MAX_INCLUDE_DEPTH {
        bail!("include nesting level too deep: {}", path.display());
    }

    // resolve includes against the real location of this file
    let from_dir = fs::canonicalize(path)
        .with_context(|| format!("failed to resolve spec file {}", path.display()))?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read spec file {}", path.display()))?;

    let mut stmts = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        match parse_line(path, idx + 1, raw)? {
            ParsedLine::Empty => {}
            ParsedLine::Include(name) => {
                let included = parse_from_file(&from_dir.join(&name), include_depth + 1)?;
                stmts.extend(included);
            }
            ParsedLine::Stmts(line_stmts) => stmts.extend(line_stmts),
        }
    }
    Ok(stmts)
}

#[derive(Debug)]
enum ParsedLine {
    Empty,
    Include(String),
    Stmts(Vec<Statement>),
}

fn parse_line(file: &Path, line_no: usize, raw: &str) -> Result<ParsedLine> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(ParsedLine::Empty);
    }

    if let Some(m) = DIRECTIVES_RE.captures(line) {
        return Ok(match &m[1] {
            "include" => ParsedLine::Include(m[2].to_string()),
            _ => ParsedLine::Stmts(vec![Statement::Run {
                command: m[2].to_string(),
            }]),
        });
    }

    if let Some(m) = LINK_RE.captures(line) {
        return Ok(ParsedLine::Stmts(vec![Statement::Link {
            source: PathBuf::from(&m[3]),
            target: PathBuf::from(m[1].trim()),
            attr: FileAttr::default(),
            hard: &m[2] == "=>",
        }]));
    }

    if let Some(m) = DIR_RE.captures(line) {
        let mode = match m.get(4) {
            Some(raw_mode) => parse_mode(raw_mode.as_str()).with_context(|| {
                format!(
                    "{}:{}: invalid directory mode: {}",
                    file.display(),
                    line_no,
                    raw_mode.as_str()
                )
            })?,
            None => DEFAULT_DIR_MODE,
        };
        let stem = &m[1];
        let tail = &m[3];
        let comps: Vec<&str> = match m.get(2) {
            Some(list) => list.as_str().split(',').collect(),
            None => vec![""],
        };
        return Ok(ParsedLine::Stmts(
            comps
                .into_iter()
                .map(|comp| Statement::Directory {
                    target: PathBuf::from(format!("{}{}{}", stem, comp.trim(), tail)),
                    attr: FileAttr::with_mode(mode),
                })
                .collect(),
        ));
    }

    if let Some(m) = DEV_RE.captures(line) {
        let device_type = match &m[2] {
            "c" | "u" => DeviceType::Char,
            "b" => DeviceType::Block,
            "p" => DeviceType::Fifo,
            _ => DeviceType::Socket,
        };
        let major: u32 = m[3].parse().with_context(|| {
            format!(
                "{}:{}: invalid major device number: {}",
                file.display(),
                line_no,
                &m[3]
            )
        })?;
        let minor: u32 = m[4].parse().with_context(|| {
            format!(
                "{}:{}: invalid minor device number: {}",
                file.display(),
                line_no,
                &m[4]
            )
        })?;
        let mut attr = FileAttr::default();
        if let Some(raw_mode) = m.get(5) {
            attr.mode = Some(parse_mode(raw_mode.as_str()).with_context(|| {
                format!(
                    "{}:{}: invalid file mode: {}",
                    file.display(),
                    line_no,
                    raw_mode.as_str()
                )
            })?);
        }
        return Ok(ParsedLine::Stmts(vec![Statement::Device {
            target: PathBuf::from(&m[1]),
            attr,
            device_type,
            major,
            minor,
        }]));
    }

    if let Some(m) = FILE_RE.captures(line) {
        let source = m[1].to_string();
        let mut target = m.get(2).map(|t| t.as_str().to_string());
        let mut mode = None;
        if let Some(raw_mode) = m.get(3) {
            mode = Some(parse_mode(raw_mode.as_str()).with_context(|| {
                format!(
                    "{}:{}: invalid file mode: {}",
                    file.display(),
                    line_no,
                    raw_mode.as_str()
                )
            })?);
        } else if let Some(second) = target.as_deref() {
            // two arguments where the second is an octal number: it is the
            // mode, and the file keeps its source name
            if let Some(parsed) = parse_mode(second) {
                mode = Some(parsed);
                target = None;
            }
        }
        let target = target.unwrap_or_else(|| source.clone());
        return Ok(ParsedLine::Stmts(vec![Statement::RegularFile {
            source: PathBuf::from(source),
            target: PathBuf::from(target),
            attr: FileAttr {
                mode,
                ..FileAttr::default()
            },
        }]));
    }

    bail!(
        "{}:{}: invalid spec statement: {}",
        file.display(),
        line_no,
        line
    );
}

/// Parse an octal file mode. `None` if the string is not a valid mode.
fn parse_mode(s: &str) -> Option<u32> {
    u32::from_str_radix(s, 8).ok().filter(|&m| m <= 0o7777)
}
