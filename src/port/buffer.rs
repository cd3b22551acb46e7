// src/port/buffer.rs

//! Channel capacity for ports.

use crate::errors::{Result, SciPipeError};

/// Capacity used when `SCIPIPE_BUFSIZE` is not set.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Environment variable overriding the channel capacity.
pub const BUFFER_SIZE_ENV: &str = "SCIPIPE_BUFSIZE";

/// Read the channel capacity from `SCIPIPE_BUFSIZE`.
pub fn buffer_size_from_env() -> Result<usize> {
    parse_buffer_size(std::env::var(BUFFER_SIZE_ENV).ok().as_deref())
}

/// Parse a raw `SCIPIPE_BUFSIZE` value.
///
/// tokio channels need a capacity of at least one, so `0` ("unbuffered")
/// maps to `1`.
pub fn parse_buffer_size(raw: Option<&str>) -> Result<usize> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_BUFFER_SIZE);
    };

    let size = raw.trim().parse::<usize>().map_err(|e| {
        SciPipeError::ConfigError(format!(
            "{BUFFER_SIZE_ENV} must be a non-negative integer (got {raw:?}): {e}"
        ))
    })?;

    Ok(size.max(1))
}
