//! Invoking the external `churny` tool and capturing its report.

use std::fs;
use std::path::Path;
use std::process::Command;

use failure::{Error, ResultExt};

const CHURN_TOOL: &str = "churny";

/// The two report flavours `churny` can produce.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChurnMode {
    /// One aggregate report over the repository's whole history.
    Overall,
    /// The same numbers broken down month by month (`-m`).
    Monthly,
}

impl ChurnMode {
    fn flags(&self) -> &'static [&'static str] {
        match *self {
            ChurnMode::Overall => &[],
            ChurnMode::Monthly => &["-m"],
        }
    }
}

/// Run `churny` against a clone and write its stdout to `out_path`.
///
/// The artifact file is truncated and written even when the tool fails, so a
/// failed run still leaves its (partial) report behind; the failure itself is
/// reported through the returned error.
pub fn run(clone_path: &Path, mode: ChurnMode, out_path: &Path) -> Result<(), Error> {
    let mut cmd = Command::new(CHURN_TOOL);
    cmd.args(mode.flags()).arg(clone_path);

    capture_stdout(cmd, out_path)
}

/// Calling the external tool failed.
#[derive(Debug, Fail)]
#[fail(display = "{} failed ({}): {}", command, status, stderr)]
pub struct ToolFailure {
    pub command: String,
    pub status: String,
    pub stderr: String,
}

/// Run a command to completion, writing its stdout to a (truncated) file and
/// turning a nonzero exit status into an error carrying the stderr text.
fn capture_stdout(mut cmd: Command, out_path: &Path) -> Result<(), Error> {
    trace!("Running {:?}", cmd);

    let output = cmd
        .output()
        .with_context(|_| format!("Unable to invoke {:?}", cmd))?;

    trace!("Exit status: {}", output.status);

    fs::write(out_path, &output.stdout)
        .with_context(|_| format!("Couldn't write {}", out_path.display()))?;

    if output.status.success() {
        Ok(())
    } else {
        let err = ToolFailure {
            command: format!("{:?}", cmd),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        Err(err.into())
    }
}
