// src/errors.rs

//! Crate-wide error type, result alias and process exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for configuration, wiring and IO errors.
pub const EXIT_CONFIG: i32 = 1;

/// Exit code used when a task's command exits with a non-zero status.
pub const EXIT_COMMAND_FAILED: i32 = 126;

#[derive(Error, Debug)]
pub enum SciPipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unconnected ports in workflow '{workflow}': {}", .ports.join(", "))]
    UnconnectedPorts {
        workflow: String,
        ports: Vec<String>,
    },

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Placeholder '{placeholder}' in '{command}': {reason}")]
    Placeholder {
        placeholder: String,
        command: String,
        reason: String,
    },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Missing input on port '{port}' for a task of process '{process}'")]
    MissingInput { process: String, port: String },

    #[error(
        "Process '{process}' requests {requested} cores per task, \
         but the workflow allows at most {max} concurrent tasks"
    )]
    TooManyCores {
        process: String,
        requested: usize,
        max: usize,
    },

    #[error("Command failed in process '{process}' (exit code {code:?}): {command}\n{output}")]
    CommandFailed {
        process: String,
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Temp file never appeared for output '{}'", .0.display())]
    TempFileMissing(PathBuf),

    #[error("Downstream port closed while sending: {0}")]
    ChannelClosed(String),

    #[error("Cycle detected in workflow: {0}")]
    Cycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SciPipeError {
    /// Process exit code for this error: 126 for failed commands, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            SciPipeError::CommandFailed { .. } => EXIT_COMMAND_FAILED,
            _ => EXIT_CONFIG,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SciPipeError>;
