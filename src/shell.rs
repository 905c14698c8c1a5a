//! Child-process execution with captured output.
//!
//! Two entry points: [`run_captured`] pipes a program's stdout and stderr,
//! reads both to end-of-stream, then collects the exit status (the `exec`
//! built-in), and [`run_status`] hands a full command line to the system
//! shell and returns only the exit status (the script engine's `shell.run`
//! escape hatch). Both block the calling thread for the child's entire
//! lifetime; no timeout is enforced.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

/// Captured result of a child process run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or -1 if the child was killed by a signal.
    pub exit_code: i32,
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// Both streams are drained before the exit status is collected, so output
/// larger than a pipe buffer cannot deadlock the child.
pub fn run_captured(program: &str, args: &[String]) -> Result<CommandOutput> {
    debug!("Running child process: {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("Failed to run '{}'", program))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Run a full command line through the system shell and return its exit
/// status. The single sanctioned process escape hatch exposed to script
/// plugins.
pub fn run_status(command_line: &str) -> Result<i32> {
    debug!("Running shell command: {}", command_line);

    let status = shell_command(command_line)
        .status()
        .with_context(|| format!("Failed to run '{}'", command_line))?;

    Ok(status.code().unwrap_or(-1))
}

#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_run_captured_collects_stdout() {
        let output = run_captured("echo", &["hello".to_string()]).unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
        assert!(output.stderr.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_run_captured_collects_stderr_and_status() {
        let output = run_captured(
            "sh",
            &["-c".to_string(), "echo oops >&2; exit 3".to_string()],
        )
        .unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(output.stderr.contains("oops"));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_run_captured_missing_program_errors() {
        assert!(run_captured("crucible-no-such-binary", &[]).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_run_status_reports_exit_code() {
        assert_eq!(run_status("true").unwrap(), 0);
        assert_eq!(run_status("exit 7").unwrap(), 7);
    }
}
