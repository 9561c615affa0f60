//! Shell command execution utilities for the SMI fabric manager.
//!
//! Every inventory query, device mutation and daemon launch goes through
//! `/bin/sh -c` so that command templates from the configuration file can
//! use the same syntax an operator would type. Values substituted into a
//! template must be passed through [`shellquote`] first.
//!
//! # Example
//!
//! ```ignore
//! use smi_cfgmgr_common::shell::{self, shellquote};
//!
//! let cmd = format!("ibstat {}", shellquote("endpoint0"));
//! let result = shell::exec(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{SmiError, SmiResult};

/// Path to the shell used for every command.
pub const SH_CMD: &str = "/bin/sh";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// # Example
///
/// ```
/// use smi_cfgmgr_common::shell::shellquote;
///
/// assert_eq!(shellquote("endpoint0"), "\"endpoint0\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Returns the program named by a command line (its first word).
pub fn program_of(cmd: &str) -> Option<&str> {
    cmd.split_whitespace().next()
}

/// Returns the last path component of a program name.
pub fn basename(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}

/// Result of a shell command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The captured stdout output.
    pub stdout: String,
    /// The captured stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Builds a successful result carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command asynchronously.
///
/// # Returns
///
/// * `Ok(ExecResult)` - The command ran; inspect [`ExecResult::success`]
/// * `Err(SmiError)` - If the command could not be spawned
pub async fn exec(cmd: &str) -> SmiResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new(SH_CMD)
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SmiError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Returns true if `program` resolves through `command -v`.
pub async fn tool_available(program: &str) -> SmiResult<bool> {
    let result = exec(&format!("command -v {}", shellquote(program))).await?;
    Ok(result.success())
}

/// Starts `cmd` in its own process group with stdout and stderr appended
/// to `log_path`, and returns its pid without waiting for it.
///
/// The command is run through `exec` so the returned pid is the daemon's
/// own pid rather than the wrapping shell's. The child is not killed when
/// this process exits.
pub fn spawn_detached(cmd: &str, log_path: &Path) -> SmiResult<u32> {
    tracing::debug!(command = %cmd, log = %log_path.display(), "Spawning detached command");

    let stdout = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let stderr = stdout.try_clone()?;

    let child = Command::new(SH_CMD)
        .arg("-c")
        .arg(format!("exec {}", cmd))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .process_group(0)
        .spawn()
        .map_err(|e| SmiError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    child
        .id()
        .ok_or_else(|| SmiError::internal(format!("spawned '{}' has no pid", cmd)))
}
