//! Declarative statement model for jail tree construction.
//!
//! A spec file parses into a list of [`Statement`]s describing what the jail
//! should contain: directories, copied files, device nodes, links, and
//! post-build commands. Statements are plain data; the expansion engine
//! ([`expand`]) turns a raw list into a closed, ordered plan, and the action
//! executor applies that plan to a jail root.
//!
//! Target paths are jail-relative (written with a leading `/`) and are only
//! joined with the jail root at execution time.

pub mod expand;
pub mod parse;

pub use expand::expand_lexical;
pub use parse::parse;

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Mode for directories created without an explicit mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Mode for device nodes created without an explicit mode.
pub const DEFAULT_DEVICE_MODE: u32 = 0o644;

/// Ownership and permission attributes attached to a statement.
///
/// `mode` is `None` when the spec line gave no explicit mode; execution then
/// falls back to a kind-specific default (directories 0755, devices 0644,
/// regular files keep the source file's own mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttr {
    pub uid: u32,
    pub gid: u32,
    pub mode: Option<u32>,
}

impl FileAttr {
    /// Attributes with an explicit mode and default ownership.
    pub fn with_mode(mode: u32) -> Self {
        FileAttr {
            mode: Some(mode),
            ..FileAttr::default()
        }
    }
}

/// Kind of device node a `Device` statement creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Char,
    Block,
    Fifo,
    Socket,
}

impl DeviceType {
    /// The file-type bits for `mknod`, OR-ed with the permission mode.
    pub fn mode_bits(self) -> u32 {
        match self {
            DeviceType::Char => libc::S_IFCHR as u32,
            DeviceType::Block => libc::S_IFBLK as u32,
            DeviceType::Fifo => libc::S_IFIFO as u32,
            DeviceType::Socket => libc::S_IFSOCK as u32,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DeviceType::Char => "character device",
            DeviceType::Block => "block device",
            DeviceType::Fifo => "fifo",
            DeviceType::Socket => "socket",
        }
    }
}

/// One declarative filesystem action.
///
/// Every variant except `Run` has a jail-relative target path. Sources
/// (where present) are host paths outside the jail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Create a directory inside the jail.
    Directory { target: PathBuf, attr: FileAttr },

    /// Copy a host file into the jail.
    RegularFile {
        source: PathBuf,
        target: PathBuf,
        attr: FileAttr,
    },

    /// Create a device node inside the jail.
    Device {
        target: PathBuf,
        attr: FileAttr,
        device_type: DeviceType,
        major: u32,
        minor: u32,
    },

    /// Create a symlink or hard link inside the jail. `source` is what the
    /// link points to; `target` is the link's own path.
    Link {
        source: PathBuf,
        target: PathBuf,
        attr: FileAttr,
        hard: bool,
    },

    /// Run a shell command with the jail root as working directory.
    Run { command: String },
}

impl Statement {
    /// Directory statement with default attributes (mode unspecified).
    pub fn directory(target: impl Into<PathBuf>) -> Self {
        Statement::Directory {
            target: target.into(),
            attr: FileAttr::default(),
        }
    }

    /// File-copy statement with default attributes (mode follows source).
    pub fn regular_file(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Statement::RegularFile {
            source: source.into(),
            target: target.into(),
            attr: FileAttr::default(),
        }
    }

    /// The host-side path this statement reads from, where applicable.
    pub fn source(&self) -> Option<&Path> {
        match self {
            Statement::RegularFile { source, .. } | Statement::Link { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// The jail-relative path this statement produces. `None` only for `Run`.
    pub fn target(&self) -> Option<&Path> {
        match self {
            Statement::Directory { target, .. }
            | Statement::RegularFile { target, .. }
            | Statement::Device { target, .. }
            | Statement::Link { target, .. } => Some(target),
            Statement::Run { .. } => None,
        }
    }

    /// Ownership/mode attributes. `None` for `Run`, which has no file effect.
    pub fn file_attr(&self) -> Option<&FileAttr> {
        match self {
            Statement::Directory { attr, .. }
            | Statement::RegularFile { attr, .. }
            | Statement::Device { attr, .. }
            | Statement::Link { attr, .. } => Some(attr),
            Statement::Run { .. } => None,
        }
    }

    fn rank(&self) -> u32 {
        match self {
            Statement::Directory { .. } => 10,
            Statement::RegularFile { .. } => 20,
            Statement::Device { .. } => 30,
            Statement::Link { .. } => 40,
            Statement::Run { .. } => 900,
        }
    }

    /// Plan ordering: directories, then files, then devices, then links,
    /// with `run` statements after everything else. Equal kinds order by
    /// target path; `run` statements never compare by target, so a stable
    /// sort keeps their relative input order.
    pub fn plan_cmp(&self, other: &Statement) -> Ordering {
        if matches!(self, Statement::Run { .. }) || matches!(other, Statement::Run { .. }) {
            return self.rank().cmp(&other.rank());
        }
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.target().cmp(&other.target()))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Directory { target, attr } => match attr.mode {
                Some(mode) => write!(
                    f,
                    "create directory '{}' (mode {:04o})",
                    target.display(),
                    mode
                ),
                None => write!(f, "create directory '{}'", target.display()),
            },
            Statement::RegularFile { source, target, .. } => {
                write!(f, "copy '{}' to '{}'", source.display(), target.display())
            }
            Statement::Device {
                target,
                device_type,
                major,
                minor,
                ..
            } => write!(
                f,
                "create {} '{}' ({}:{})",
                device_type.describe(),
                target.display(),
                major,
                minor
            ),
            Statement::Link {
                source,
                target,
                hard,
                ..
            } => {
                let kind = if *hard { "hard link" } else { "symlink" };
                write!(
                    f,
                    "create {} '{}' to '{}'",
                    kind,
                    target.display(),
                    source.display()
                )
            }
            Statement::Run { command } => write!(f, "run \"{}\"", command),
        }
    }
}
