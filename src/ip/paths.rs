// src/ip/paths.rs

//! Path conventions for information packets.

use std::path::Path;

use crate::errors::{Result, SciPipeError};

/// Suffix of the in-progress file a task writes before atomizing.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix of the named pipe used for streaming outputs.
pub const FIFO_SUFFIX: &str = ".fifo";

/// Suffix of the JSON audit file written next to every final output.
pub const AUDIT_SUFFIX: &str = ".audit.json";

pub fn temp_path(path: &str) -> String {
    format!("{path}{TEMP_SUFFIX}")
}

pub fn fifo_path(path: &str) -> String {
    format!("{path}{FIFO_SUFFIX}")
}

pub fn audit_path(path: &str) -> String {
    format!("{path}{AUDIT_SUFFIX}")
}

/// Reject paths the engine cannot safely splice into a shell command.
pub fn validate_path(path: &str) -> Result<()> {
    let reason = if path.is_empty() {
        Some("path is empty")
    } else if path.chars().any(char::is_whitespace) {
        Some("path contains whitespace")
    } else if path.starts_with("\\\\") {
        Some("UNC paths are not supported")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SciPipeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Rewrite a path so it resolves the same from inside a task workdir.
///
/// Task workdirs live directly below the current directory, so relative
/// paths get one `../` prefix; absolute paths are returned as they are.
pub fn relative_to_workdir(path: &str) -> String {
    if path.is_empty() || Path::new(path).is_absolute() {
        path.to_string()
    } else {
        format!("../{path}")
    }
}
