//! Shell execution for `run` statements.
//!
//! Commands go through `/bin/sh -c` with the jail root as working
//! directory and output streamed straight to the caller's terminal, so
//! post-install scripts behave as if run by hand from inside the jail.

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{bail, Context, Result};

/// Run `command` through the shell with `dir` as the working directory.
///
/// Stdout and stderr are inherited. Stdin is connected to the null device,
/// so commands that try to read input see end-of-file instead of hanging.
/// A non-zero exit status is an error naming the command.
pub fn shell_streamed(command: &str, dir: &Path) -> Result<ExitStatus> {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to execute shell for \"{command}\""))?;

    if !status.success() {
        bail!(
            "command \"{}\" failed (exit code {})",
            command,
            status.code().unwrap_or(-1)
        );
    }
    Ok(status)
}
