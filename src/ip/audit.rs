// src/ip/audit.rs

//! Audit trail written next to every final output file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{Params, Tags};

/// Record of how one task produced its outputs.
///
/// Serialized with PascalCase keys, e.g.:
///
/// ```json
/// {
///   "ProcessName": "world",
///   "Command": "echo $(cat ../hello.txt) World >> ../hello_world.txt.tmp",
///   "Params": {},
///   "Tags": {},
///   "StartTime": "2024-01-01T10:00:00.000000001Z",
///   "EndTime": "2024-01-01T10:00:00.010000001Z",
///   "ExecTimeNS": 10000000,
///   "Host": "worker-1",
///   "UpstreamAuditInfos": { "in": { ... } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditInfo {
    #[serde(default)]
    pub process_name: String,
    pub command: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub tags: Tags,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "ExecTimeNS")]
    pub exec_time_ns: i64,
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_tag: Option<String>,
    #[serde(default)]
    pub upstream_audit_infos: BTreeMap<String, AuditInfo>,
}

impl AuditInfo {
    /// Start a record for a task that begins now.
    pub fn started(process_name: &str, command: &str, params: &Params) -> Self {
        let now = Utc::now();
        Self {
            process_name: process_name.to_string(),
            command: command.to_string(),
            params: params.clone(),
            tags: Tags::new(),
            start_time: now,
            end_time: now,
            exec_time_ns: 0,
            host: local_host().to_string(),
            container_tag: None,
            upstream_audit_infos: BTreeMap::new(),
        }
    }

    /// Stamp the end time and execution duration.
    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.end_time = end_time;
        self.exec_time_ns = (end_time - self.start_time)
            .num_nanoseconds()
            .unwrap_or(i64::MAX);
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Host name recorded in audit files, resolved once per process.
pub fn local_host() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "localhost".to_string())
    })
}
