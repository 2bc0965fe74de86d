use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::{Result, SystemError};

/// A program invocation, kept as data so it can be logged and inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    pub fn has_args(&self, expected: &[&str]) -> bool {
        expected.iter().all(|e| self.args.iter().any(|a| a == e))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr, trimmed, for log lines.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }
}

/// Seam between the coordinator and the external CLIs it drives
/// (systemctl, etcdctl, kubectl).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion. Only spawn failures and timeouts are
    /// errors; a non-zero exit is reported through `CommandOutput::status`.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;

    /// Like `run`, but a non-zero exit becomes `SystemError::CommandFailed`.
    async fn run_checked(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(SystemError::CommandFailed {
                command: command.to_string(),
                status: output.status,
                output: output.combined(),
            })
        }
    }
}

/// Runs commands as child processes with a hard timeout. The child is killed
/// when the timeout fires.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!("Running `{}`", command);

        let mut child = Command::new(&command.program);
        child
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, child.output())
            .await
            .map_err(|_| SystemError::Timeout {
                command: command.to_string(),
                after: self.timeout,
            })?
            .map_err(|source| SystemError::Spawn {
                command: command.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
