// src/ip/file_ip.rs

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::audit::AuditInfo;
use super::paths::{audit_path, fifo_path, temp_path, validate_path};
use crate::errors::Result;
use crate::types::Tags;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A file artifact flowing between processes.
///
/// The final path is never written by a task directly: commands write the
/// temp path (`<path>.tmp`) and the task atomizes it once the command has
/// succeeded. Streaming packets are read and written through `<path>.fifo`
/// and never get a final file.
#[derive(Debug)]
pub struct FileIp {
    path: String,
    stream: bool,
    tags: Mutex<Tags>,
    audit: Mutex<Option<AuditInfo>>,
    /// Serializes rename / FIFO operations on this packet.
    io_lock: Mutex<()>,
}

impl FileIp {
    /// Packet for a regular (non-streaming) file.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        Self::build(path.into(), false)
    }

    /// Packet whose data travels through a named pipe.
    pub fn new_streaming(path: impl Into<String>) -> Result<Self> {
        Self::build(path.into(), true)
    }

    fn build(path: String, stream: bool) -> Result<Self> {
        validate_path(&path)?;
        Ok(Self {
            path,
            stream,
            tags: Mutex::new(Tags::new()),
            audit: Mutex::new(None),
            io_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn temp_path(&self) -> String {
        temp_path(&self.path)
    }

    pub fn fifo_path(&self) -> String {
        fifo_path(&self.path)
    }

    pub fn audit_path(&self) -> String {
        audit_path(&self.path)
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// Path a consumer should read: the FIFO for streaming packets.
    pub fn read_path(&self) -> String {
        if self.stream {
            self.fifo_path()
        } else {
            self.path.clone()
        }
    }

    pub fn exists(&self) -> bool {
        Path::new(&self.path).exists()
    }

    pub fn temp_exists(&self) -> bool {
        Path::new(&self.temp_path()).exists()
    }

    pub fn fifo_exists(&self) -> bool {
        Path::new(&self.fifo_path()).exists()
    }

    pub fn tag(&self, name: &str) -> Option<String> {
        lock(&self.tags).get(name).cloned()
    }

    pub fn tags(&self) -> Tags {
        lock(&self.tags).clone()
    }

    pub fn set_tag(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.tags).insert(name.into(), value.into());
    }

    /// Merge tags into this packet; existing keys are overwritten.
    pub fn add_tags(&self, tags: &Tags) {
        let mut own = lock(&self.tags);
        for (k, v) in tags {
            own.insert(k.clone(), v.clone());
        }
    }

    /// Audit info of the task that produced this file.
    ///
    /// Packets created from files already on disk load it lazily from the
    /// `.audit.json` sibling the first time it is asked for.
    pub fn audit_info(&self) -> Option<AuditInfo> {
        let mut audit = lock(&self.audit);
        if audit.is_none() {
            let path = self.audit_path();
            if Path::new(&path).exists() {
                match AuditInfo::read_from(&path) {
                    Ok(info) => *audit = Some(info),
                    Err(e) => warn!(path = %path, error = %e, "could not read audit file"),
                }
            }
        }
        audit.clone()
    }

    pub fn set_audit_info(&self, info: AuditInfo) {
        *lock(&self.audit) = Some(info);
    }

    /// Write the current audit info to `<path>.audit.json`.
    pub fn write_audit_file(&self) -> Result<()> {
        let audit = lock(&self.audit).clone();
        if let Some(info) = audit {
            info.write_to(self.audit_path())?;
            debug!(path = %self.audit_path(), "wrote audit file");
        }
        Ok(())
    }

    /// Rename the temp file to the final path.
    ///
    /// Calling it again after a successful rename is a no-op.
    pub fn atomize(&self) -> Result<()> {
        let _guard = lock(&self.io_lock);
        let temp = self.temp_path();
        if !Path::new(&temp).exists() && self.exists() {
            debug!(path = %self.path, "already atomized");
            return Ok(());
        }
        fs::rename(&temp, &self.path)?;
        debug!(from = %temp, to = %self.path, "atomized output");
        Ok(())
    }

    /// Remove the named pipe, if any.
    pub fn remove_fifo(&self) -> Result<()> {
        let _guard = lock(&self.io_lock);
        let fifo = self.fifo_path();
        if Path::new(&fifo).exists() {
            fs::remove_file(&fifo)?;
            debug!(path = %fifo, "removed fifo");
        }
        Ok(())
    }

    /// Create the parent directory of the output, if it has one.
    pub fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
