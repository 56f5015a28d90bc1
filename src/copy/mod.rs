//! File copying with permission propagation, optional copy-on-write
//! cloning, and a progress callback.
//!
//! This is deliberately plain `cp` behavior: data and permission bits move,
//! ownership and timestamps do not. The jail executor runs every regular
//! file through [`copy_file`].

pub mod cow;

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Chunk size for buffered copies.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// When to attempt a copy-on-write clone instead of a buffered copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reflink {
    /// Always copy bytes.
    #[default]
    Never,
    /// Clone or fail; never fall back to copying.
    Always,
    /// Try to clone, silently copy bytes when cloning is unavailable.
    Auto,
}

/// Progress callback: receives bytes written so far and the total size.
/// Returning `false` aborts the copy early without an error.
pub type ProgressFn = Box<dyn FnMut(u64, u64) -> bool>;

pub struct CopyOptions {
    /// Retry after removing the destination if it cannot be created.
    pub force: bool,
    /// Remove the destination up front, ignoring a missing file.
    pub remove_destination: bool,
    pub reflink: Reflink,
    pub buffer_size: usize,
    pub progress: Option<ProgressFn>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            force: false,
            remove_destination: false,
            reflink: Reflink::Never,
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress: None,
        }
    }
}

impl CopyOptions {
    pub fn with_progress(mut self, progress: impl FnMut(u64, u64) -> bool + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }
}

/// Copy `source` to `dest`, returning the number of bytes written.
///
/// The destination ends up with the source's permission bits. An aborted
/// copy (progress callback returned `false`) is not an error; the caller
/// gets the partial byte count back.
pub fn copy_file(source: &Path, dest: &Path, options: &mut CopyOptions) -> Result<u64> {
    let mut src =
        File::open(source).with_context(|| format!("failed to open {}", source.display()))?;
    let meta = src
        .metadata()
        .with_context(|| format!("failed to stat {}", source.display()))?;
    let total = meta.len();

    if options.remove_destination {
        remove_existing(dest)?;
    }

    let mut dst = create_dest(dest, options.force)?;

    if cow::have_cow() && options.reflink != Reflink::Never {
        match cow::clone_file(&src, &dst) {
            Ok(()) => {
                if let Some(progress) = options.progress.as_mut() {
                    progress(total, total);
                }
                copy_mode(&meta, &dst, dest)?;
                return Ok(total);
            }
            Err(e) if options.reflink == Reflink::Always => {
                return Err(e).with_context(|| {
                    format!(
                        "failed to clone {} to {}",
                        source.display(),
                        dest.display()
                    )
                });
            }
            Err(_) => {} // fall back to a buffered copy
        }
    } else if options.reflink == Reflink::Always {
        bail!("copy-on-write cloning is not supported on this platform");
    }

    let mut buf = vec![0u8; options.buffer_size.max(1)];
    let mut written: u64 = 0;
    loop {
        if let Some(progress) = options.progress.as_mut() {
            if !progress(written, total) {
                break;
            }
        }
        if written >= total {
            break;
        }
        let want = buf.len().min((total - written) as usize);
        let n = match src.read(&mut buf[..want]) {
            Ok(0) => break, // source shrank underneath us
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", source.display()));
            }
        };
        dst.write_all(&buf[..n])
            .with_context(|| format!("failed to write {}", dest.display()))?;
        written += n as u64;
    }

    dst.sync_all()
        .with_context(|| format!("failed to sync {}", dest.display()))?;
    copy_mode(&meta, &dst, dest)?;
    Ok(written)
}

fn remove_existing(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn create_dest(dest: &Path, force: bool) -> Result<File> {
    match File::create(dest) {
        Ok(f) => Ok(f),
        Err(_) if force => {
            fs::remove_file(dest)
                .with_context(|| format!("failed to remove {}", dest.display()))?;
            File::create(dest).with_context(|| format!("failed to create {}", dest.display()))
        }
        Err(e) => Err(e).with_context(|| format!("failed to create {}", dest.display())),
    }
}

fn copy_mode(meta: &fs::Metadata, dst: &File, dest: &Path) -> Result<()> {
    let mode = meta.permissions().mode() & 0o7777;
    dst.set_permissions(fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to chmod {}", dest.display()))
}
