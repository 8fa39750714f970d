//! Bounded subprocess execution for command-line backends

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

use crate::error::BackendError;

/// Run `program args..` and return its stdout
///
/// The child is killed if it outlives `timeout`. A non-zero exit status is
/// reported as [`BackendError::CommandFailed`].
pub async fn run(
    backend: &'static str,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, BackendError> {
    let command_line = describe(program, args);
    trace!(backend, command = %command_line, "Running command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| BackendError::Timeout {
            backend,
            after: timeout,
        })?
        .map_err(|e| BackendError::io(backend, e))?;

    if !output.status.success() {
        return Err(BackendError::CommandFailed {
            backend,
            command: command_line,
            status: output.status.code().unwrap_or(-1),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Start `program args..` without waiting for it
pub fn spawn_detached(
    backend: &'static str,
    program: &str,
    args: &[&str],
) -> Result<(), BackendError> {
    trace!(backend, command = %describe(program, args), "Spawning command");

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_child| ())
        .map_err(|e| BackendError::io(backend, e))
}

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
