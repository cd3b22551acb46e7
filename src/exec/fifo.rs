// src/exec/fifo.rs

//! Named pipes for streaming outputs.

use std::process::Stdio;

use anyhow::{anyhow, Context};
use tokio::process::Command;
use tracing::debug;

use crate::errors::Result;

/// Create a FIFO at `path` with `mkfifo`.
pub async fn make_fifo(path: &str) -> Result<()> {
    let out = Command::new("mkfifo")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("running mkfifo for '{path}'"))?;

    if !out.status.success() {
        return Err(anyhow!(
            "mkfifo '{path}' failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )
        .into());
    }

    debug!(fifo = %path, "created fifo");
    Ok(())
}
