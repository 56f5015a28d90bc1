//! Apply expanded statements to a jail directory tree.
//!
//! Every target path is re-anchored beneath the jail root before anything
//! touches the filesystem, so a spec full of absolute paths builds a tree
//! under `./jail` instead of scribbling over the host.

use std::ffi::CString;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::copy::{self, CopyOptions, Reflink, DEFAULT_BUFFER_SIZE};
use crate::process;
use crate::spec::{Statement, DEFAULT_DEVICE_MODE, DEFAULT_DIR_MODE};

/// Options governing how statements are applied.
pub struct ApplyOptions {
    /// Retry file copies after removing a destination that cannot be opened.
    pub force: bool,
    /// Remove each destination file before copying.
    pub remove_destination: bool,
    pub reflink: Reflink,
    pub buffer_size: usize,
    /// Print each action as it runs.
    pub verbose: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        ApplyOptions {
            force: false,
            remove_destination: false,
            reflink: Reflink::Never,
            buffer_size: DEFAULT_BUFFER_SIZE,
            verbose: false,
        }
    }
}

/// glibc's sysmacros encoding of a device number.
pub fn make_dev(major: u32, minor: u32) -> u64 {
    let (major, minor) = (u64::from(major), u64::from(minor));
    (minor & 0xff) | ((major & 0xfff) << 8) | ((minor & !0xff) << 12) | ((major & !0xfff) << 32)
}

/// Join a statement target onto the jail root. Absolute targets are
/// re-anchored inside the jail rather than escaping it.
pub fn target_in_jail(jail: &Path, target: &Path) -> PathBuf {
    match target.strip_prefix("/") {
        Ok(relative) => jail.join(relative),
        Err(_) => jail.join(target),
    }
}

/// Apply a single statement beneath `jail`.
pub fn apply_statement(jail: &Path, stmt: &Statement, options: &ApplyOptions) -> Result<()> {
    if options.verbose {
        println!("  {stmt}");
    }
    match stmt {
        Statement::Directory { target, attr } => {
            let dest = target_in_jail(jail, target);
            DirBuilder::new()
                .recursive(true)
                .mode(attr.mode.unwrap_or(DEFAULT_DIR_MODE))
                .create(&dest)
                .with_context(|| format!("failed to create directory {}", dest.display()))
        }
        Statement::RegularFile {
            source,
            target,
            attr,
        } => {
            let dest = target_in_jail(jail, target);
            let mut copts = CopyOptions {
                force: options.force,
                remove_destination: options.remove_destination,
                reflink: options.reflink,
                buffer_size: options.buffer_size,
                progress: None,
            };
            copy::copy_file(source, &dest, &mut copts)?;
            if let Some(mode) = attr.mode {
                fs::set_permissions(&dest, fs::Permissions::from_mode(mode))
                    .with_context(|| format!("failed to chmod {}", dest.display()))?;
            }
            Ok(())
        }
        Statement::Link {
            source,
            target,
            hard,
            ..
        } => {
            let dest = target_in_jail(jail, target);
            remove_existing(&dest)?;
            if *hard {
                fs::hard_link(source, &dest).with_context(|| {
                    format!(
                        "failed to hard link {} to {}",
                        dest.display(),
                        source.display()
                    )
                })
            } else {
                symlink(source, &dest).with_context(|| {
                    format!(
                        "failed to symlink {} to {}",
                        dest.display(),
                        source.display()
                    )
                })
            }
        }
        Statement::Device {
            target,
            attr,
            device_type,
            major,
            minor,
        } => {
            let dest = target_in_jail(jail, target);
            remove_existing(&dest)?;
            let mode = device_type.mode_bits() | attr.mode.unwrap_or(DEFAULT_DEVICE_MODE);
            mknod(&dest, mode, make_dev(*major, *minor))
        }
        Statement::Run { command } => {
            process::shell_streamed(command, jail)?;
            Ok(())
        }
    }
}

/// Remove whatever sits at `path`, if anything. Uses lstat so dangling
/// symlinks are removed too instead of tripping up the link creation
/// that follows.
fn remove_existing(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

fn mknod(path: &Path, mode: u32, dev: u64) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains a NUL byte: {}", path.display()))?;
    let rc = unsafe { libc::mknod(c_path.as_ptr(), mode as libc::mode_t, dev as libc::dev_t) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
            .with_context(|| format!("failed to mknod {}", path.display()))
    }
}
