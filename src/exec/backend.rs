// src/exec/backend.rs

//! Pluggable command execution.
//!
//! Tasks never spawn processes themselves; they hand a [`CommandRequest`] to
//! an `ExecutorBackend`.
//!
//! - [`ShellBackend`] is the default. It runs the command with `bash -lc`
//!   inside the task's workdir.
//! - Tests provide their own backend that, for example, records commands and
//!   measures how many run at the same time.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;

/// One command to run for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub process: String,
    pub command: String,
    /// Directory the command runs in; created by the task beforehand.
    pub workdir: PathBuf,
}

/// What a finished command reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait abstracting how task commands are executed.
pub trait ExecutorBackend: Send + Sync {
    /// Run one command to completion.
    ///
    /// An `Err` means the command could not be run at all; a command that
    /// ran and failed is reported through [`CommandOutput::code`].
    fn run_command(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>>;
}

/// Runs commands through `bash -lc` with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ShellBackend {
    shell: String,
}

impl Default for ShellBackend {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl ShellBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another shell (it must accept `-lc COMMAND`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl ExecutorBackend for ShellBackend {
    fn run_command(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(async move {
            debug!(
                process = %request.process,
                workdir = %request.workdir.display(),
                cmd = %request.command,
                "spawning shell"
            );

            let mut cmd = Command::new(&self.shell);
            cmd.arg("-lc")
                .arg(&request.command)
                .current_dir(&request.workdir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let out = cmd.output().await.with_context(|| {
                format!("spawning command for process '{}'", request.process)
            })?;

            let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
            output.push_str(&String::from_utf8_lossy(&out.stderr));

            let code = out.status.code();
            info!(
                process = %request.process,
                exit_code = ?code,
                success = out.status.success(),
                "command exited"
            );

            Ok(CommandOutput { code, output })
        })
    }
}
