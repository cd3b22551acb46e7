// src/ip/mod.rs

//! Information packets: the values that flow along ports.
//!
//! - [`file_ip`] holds [`FileIp`], a handle to one file artifact with its
//!   temp / FIFO / audit siblings.
//! - [`audit`] holds the [`AuditInfo`] record serialized next to outputs.
//! - [`paths`] has the path suffix conventions and validation.

pub mod audit;
pub mod file_ip;
pub mod paths;

use std::sync::Arc;

pub use audit::AuditInfo;
pub use file_ip::FileIp;

use crate::errors::Result;
use crate::types::Tags;

/// A packet travelling on an in/out port.
#[derive(Debug, Clone)]
pub enum Ip {
    /// A single file.
    File(Arc<FileIp>),
    /// A bundle of files delivered as one unit.
    SubStream(SubStream),
}

impl Ip {
    /// Convenience constructor for a regular file packet.
    pub fn file(path: impl Into<String>) -> Result<Self> {
        Ok(Ip::File(Arc::new(FileIp::new(path)?)))
    }

    pub fn as_file(&self) -> Option<&Arc<FileIp>> {
        match self {
            Ip::File(ip) => Some(ip),
            Ip::SubStream(_) => None,
        }
    }

    /// Final path of a file packet; empty for sub-streams.
    pub fn path(&self) -> &str {
        match self {
            Ip::File(ip) => ip.path(),
            Ip::SubStream(_) => "",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Ip::File(ip) if ip.is_streaming())
    }

    /// Tags of the packet; a sub-stream exposes the union of its members' tags.
    pub fn tags(&self) -> Tags {
        match self {
            Ip::File(ip) => ip.tags(),
            Ip::SubStream(s) => {
                let mut tags = Tags::new();
                for ip in s.ips() {
                    tags.extend(ip.tags());
                }
                tags
            }
        }
    }

    pub fn tag(&self, name: &str) -> Option<String> {
        match self {
            Ip::File(ip) => ip.tag(name),
            Ip::SubStream(_) => self.tags().get(name).cloned(),
        }
    }

    /// Audit infos of the packet keyed under `port` (`port[i]` for
    /// sub-stream members).
    pub fn audit_infos(&self, port: &str) -> Vec<(String, AuditInfo)> {
        match self {
            Ip::File(ip) => ip
                .audit_info()
                .map(|a| vec![(port.to_string(), a)])
                .unwrap_or_default(),
            Ip::SubStream(s) => s
                .ips()
                .iter()
                .enumerate()
                .filter_map(|(i, ip)| ip.audit_info().map(|a| (format!("{port}[{i}]"), a)))
                .collect(),
        }
    }
}

/// Ordered bundle of file packets sent as a single packet.
#[derive(Debug, Clone, Default)]
pub struct SubStream {
    ips: Vec<Arc<FileIp>>,
}

impl SubStream {
    pub fn new(ips: Vec<Arc<FileIp>>) -> Self {
        Self { ips }
    }

    pub fn ips(&self) -> &[Arc<FileIp>] {
        &self.ips
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}
