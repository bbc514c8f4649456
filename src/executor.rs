//! External tool execution.
//!
//! Every side effect of a job goes through a `CommandRunner`. The runner never
//! returns `Ok` for a failed tool: a non-zero exit, a missing binary and any
//! other failure are separate `ExecutionError` variants so callers can decide
//! per call site whether the failure is item-fatal or only a warning.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::errors::ExecutionError;

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Substrings masked whenever the command is displayed
    pub secrets: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            secrets: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            let arg = self.redact(arg);
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg);
            }
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(
        &self,
        command: &ToolCommand,
        description: &str,
    ) -> Result<ToolOutput, ExecutionError>;
}

/// Runs tools as child processes and captures their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(
        &self,
        command: &ToolCommand,
        description: &str,
    ) -> Result<ToolOutput, ExecutionError> {
        debug!(command = %command, "{}", description);
        let start = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExecutionError::ToolNotFound {
                    program: command.program.clone(),
                }
            } else {
                ExecutionError::UnexpectedFailure(format!(
                    "failed to run {}: {}",
                    command.program, e
                ))
            }
        })?;

        let stdout = command.redact(&String::from_utf8_lossy(&output.stdout));
        let stderr = command.redact(&String::from_utf8_lossy(&output.stderr));
        let duration = start.elapsed();

        if !stdout.trim().is_empty() {
            debug!(program = %command.program, "stdout: {}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            debug!(program = %command.program, "stderr: {}", stderr.trim_end());
        }

        if output.status.success() {
            debug!(
                program = %command.program,
                elapsed_ms = duration.as_millis() as u64,
                "Command succeeded"
            );
            Ok(ToolOutput {
                stdout,
                stderr,
                duration,
            })
        } else {
            // Killed by a signal: no exit code
            let code = output.status.code().unwrap_or(-1);
            Err(ExecutionError::NonZeroExit {
                code,
                stdout,
                stderr,
            })
        }
    }
}
