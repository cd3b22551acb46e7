// src/task/finalize.rs

//! Turning a finished command's temp files into final outputs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{Result, SciPipeError};
use crate::ip::{AuditInfo, FileIp};

/// First wait when a temp file is not visible yet.
pub const ATOMIZE_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Number of waits (doubling each time) before giving up on a temp file.
pub const ATOMIZE_MAX_ATTEMPTS: u32 = 8;

/// Atomize every regular output, write its audit file, and unlink the FIFOs
/// of streaming outputs.
pub async fn finalize_outputs(
    out_ips: &BTreeMap<String, Arc<FileIp>>,
    audit: &AuditInfo,
) -> Result<()> {
    for (port, ip) in out_ips {
        if ip.is_streaming() {
            ip.remove_fifo()?;
            continue;
        }

        wait_for_temp(ip).await?;
        ip.atomize()?;
        ip.set_audit_info(audit.clone());
        ip.write_audit_file()?;
        debug!(port = %port, path = %ip.path(), "finalized output");
    }
    Ok(())
}

/// Wait for a temp file that a slow filesystem has not made visible yet.
async fn wait_for_temp(ip: &FileIp) -> Result<()> {
    let mut delay = ATOMIZE_INITIAL_DELAY;

    for attempt in 1..=ATOMIZE_MAX_ATTEMPTS {
        if ip.temp_exists() || ip.exists() {
            return Ok(());
        }
        warn!(
            path = %ip.temp_path(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "temp file not found after command finished; waiting"
        );
        tokio::time::sleep(delay).await;
        delay *= 2;
    }

    if ip.temp_exists() || ip.exists() {
        Ok(())
    } else {
        Err(SciPipeError::TempFileMissing(PathBuf::from(ip.temp_path())))
    }
}
