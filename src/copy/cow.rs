//! Copy-on-write file cloning.
//!
//! On Linux this issues the `FICLONE` ioctl, which shares extents between
//! source and destination on filesystems that support it (btrfs, XFS with
//! reflink, bcachefs). Other platforms report cloning as unavailable and
//! callers fall back to a buffered copy.

#[cfg(target_os = "linux")]
mod imp {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    use anyhow::Result;

    pub fn have_cow() -> bool {
        true
    }

    pub fn clone_file(src: &File, dst: &File) -> Result<()> {
        let rc = unsafe { libc::ioctl(dst.as_raw_fd(), libc::FICLONE, src.as_raw_fd()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error().into())
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use std::fs::File;

    use anyhow::{bail, Result};

    pub fn have_cow() -> bool {
        false
    }

    pub fn clone_file(_src: &File, _dst: &File) -> Result<()> {
        bail!("copy-on-write cloning is not supported on this platform");
    }
}

pub use imp::{clone_file, have_cow};
