//! Async subprocess execution for the external cluster tools.
//!
//! `kubectl` and `helm` are driven through this runner so every call has
//! captured output, an optional stdin payload and an optional hard timeout.

use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stderr if present, otherwise stdout, for error reporting
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Outcome of a command run with a deadline.
#[derive(Debug)]
pub enum RunOutcome {
    Finished(CommandOutput),
    TimedOut,
}

/// Check that a binary is installed and on PATH.
pub fn check_binary(program: &str) -> Result<()> {
    match which::which(program) {
        Ok(path) => {
            debug!("Found {} at: {:?}", program, path);
            Ok(())
        }
        Err(_) => Err(Error::CommandNotFound(program.to_string())),
    }
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command to completion, optionally feeding `stdin`.
///
/// A non-zero exit is not an error here; callers inspect `success`.
pub async fn run(program: &str, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::CommandNotFound(program.to_string()),
        _ => Error::Io(e),
    })?;

    if let Some(payload) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(payload).await?;
            pipe.shutdown().await?;
        }
    }

    let output = child.wait_with_output().await?;
    let result = CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    debug!(
        command = %display_command(program, args),
        code = ?result.code,
        "Command finished"
    );
    Ok(result)
}

/// Run a command with a deadline. The child is killed if the deadline passes.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<RunOutcome> {
    match tokio::time::timeout(timeout, run(program, args, stdin)).await {
        Ok(output) => Ok(RunOutcome::Finished(output?)),
        Err(_) => Ok(RunOutcome::TimedOut),
    }
}
