//! Execution-plan manifests.
//!
//! A fully expanded plan can be dumped to JSON and reloaded later, which
//! makes `jailtree plan` output diffable and lets build pipelines inspect
//! what an update would do before letting it touch a jail.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::spec::{DeviceType, FileAttr, Statement};

/// One entry of a serialized execution plan.
///
/// Modes are carried as zero-padded octal strings so the JSON reads the way
/// modes are written everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanEntry {
    Directory {
        target: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    File {
        source: PathBuf,
        target: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    Device {
        target: PathBuf,
        device_type: String,
        major: u32,
        minor: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    Link {
        source: PathBuf,
        target: PathBuf,
        hard: bool,
    },
    Run {
        command: String,
    },
}

/// A serialized execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanManifest {
    pub entries: Vec<PlanEntry>,
}

impl PlanManifest {
    /// Capture an expanded plan.
    pub fn from_plan(plan: &[Statement]) -> Self {
        PlanManifest {
            entries: plan.iter().map(PlanEntry::from).collect(),
        }
    }

    /// Reconstruct the statement list this manifest was captured from.
    pub fn to_plan(&self) -> Result<Vec<Statement>> {
        self.entries.iter().map(PlanEntry::to_statement).collect()
    }

    /// Render the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize plan manifest")
    }

    /// Save the manifest to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Load a manifest from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse plan manifest {}", path.display()))
    }
}

impl From<&Statement> for PlanEntry {
    fn from(stmt: &Statement) -> Self {
        match stmt {
            Statement::Directory { target, attr } => PlanEntry::Directory {
                target: target.clone(),
                mode: attr.mode.map(format_mode),
            },
            Statement::RegularFile {
                source,
                target,
                attr,
            } => PlanEntry::File {
                source: source.clone(),
                target: target.clone(),
                mode: attr.mode.map(format_mode),
            },
            Statement::Device {
                target,
                attr,
                device_type,
                major,
                minor,
            } => PlanEntry::Device {
                target: target.clone(),
                device_type: device_type_token(*device_type).to_string(),
                major: *major,
                minor: *minor,
                mode: attr.mode.map(format_mode),
            },
            Statement::Link {
                source,
                target,
                hard,
                ..
            } => PlanEntry::Link {
                source: source.clone(),
                target: target.clone(),
                hard: *hard,
            },
            Statement::Run { command } => PlanEntry::Run {
                command: command.clone(),
            },
        }
    }
}

impl PlanEntry {
    fn to_statement(&self) -> Result<Statement> {
        Ok(match self {
            PlanEntry::Directory { target, mode } => Statement::Directory {
                target: target.clone(),
                attr: attr_from_mode(mode.as_deref())?,
            },
            PlanEntry::File {
                source,
                target,
                mode,
            } => Statement::RegularFile {
                source: source.clone(),
                target: target.clone(),
                attr: attr_from_mode(mode.as_deref())?,
            },
            PlanEntry::Device {
                target,
                device_type,
                major,
                minor,
                mode,
            } => Statement::Device {
                target: target.clone(),
                attr: attr_from_mode(mode.as_deref())?,
                device_type: parse_device_type(device_type)?,
                major: *major,
                minor: *minor,
            },
            PlanEntry::Link {
                source,
                target,
                hard,
            } => Statement::Link {
                source: source.clone(),
                target: target.clone(),
                attr: FileAttr::default(),
                hard: *hard,
            },
            PlanEntry::Run { command } => Statement::Run {
                command: command.clone(),
            },
        })
    }
}

fn format_mode(mode: u32) -> String {
    format!("{mode:04o}")
}

fn attr_from_mode(mode: Option<&str>) -> Result<FileAttr> {
    let Some(mode) = mode else {
        return Ok(FileAttr::default());
    };
    let parsed = u32::from_str_radix(mode, 8)
        .with_context(|| format!("invalid octal mode in plan manifest: {mode}"))?;
    Ok(FileAttr::with_mode(parsed))
}

fn device_type_token(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::Char => "char",
        DeviceType::Block => "block",
        DeviceType::Fifo => "fifo",
        DeviceType::Socket => "socket",
    }
}

fn parse_device_type(token: &str) -> Result<DeviceType> {
    Ok(match token {
        "char" => DeviceType::Char,
        "block" => DeviceType::Block,
        "fifo" => DeviceType::Fifo,
        "socket" => DeviceType::Socket,
        other => bail!("unknown device type in plan manifest: {other}"),
    })
}
