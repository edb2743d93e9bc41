use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ShellError {
    /// The executable could not be started (missing, not executable, ...).
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The tool ran but exited non-zero.
    #[error("`{command}` failed with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The tool did not finish within the allowed time and was killed.
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

/// Subprocess access for dependency sources.
///
/// Injected rather than called directly so resolvers can be tested against a
/// fake without spawning real processes.
pub trait Shell {
    /// Non-destructive probe: does `tool` exist and carry an executable bit?
    fn tool_available(&self, tool: &Path) -> bool;

    /// Run `tool` with `args` and capture its stdout. Any outcome other than
    /// a clean zero exit is an error.
    async fn run(&self, tool: &Path, args: &[&str]) -> Result<String, ShellError>;
}

/// [`Shell`] backed by real processes.
pub struct SystemShell {
    /// Ceiling on a single invocation. The tools we shell out to answer in
    /// well under a second; anything near this long is a wedged environment.
    timeout: Duration,
}

impl SystemShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Shell for SystemShell {
    fn tool_available(&self, tool: &Path) -> bool {
        is_executable(tool)
    }

    async fn run(&self, tool: &Path, args: &[&str]) -> Result<String, ShellError> {
        let command = render_command(tool, args);

        // kill_on_drop reaps the child if the timeout fires and the output
        // future is dropped.
        let output = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| ShellError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ShellError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ShellError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn render_command(tool: &Path, args: &[&str]) -> String {
    let mut command = tool.display().to_string();
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

/// Check whether `path` is a file the current user may execute.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
