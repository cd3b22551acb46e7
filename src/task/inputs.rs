// src/task/inputs.rs

use std::collections::BTreeMap;

use crate::ip::Ip;
use crate::types::{Params, Tags};

/// What one task received: one packet per in-port and one value per
/// parameter port.
///
/// Path formatters see this before the task's outputs are decided.
#[derive(Debug, Clone, Default)]
pub struct TaskInputs {
    pub process: String,
    pub in_ips: BTreeMap<String, Ip>,
    pub params: Params,
}

impl TaskInputs {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            ..Self::default()
        }
    }

    pub fn with_ip(mut self, port: impl Into<String>, ip: Ip) -> Self {
        self.in_ips.insert(port.into(), ip);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn in_ip(&self, port: &str) -> Option<&Ip> {
        self.in_ips.get(port)
    }

    /// Final path of the file packet on `port`.
    pub fn in_path(&self, port: &str) -> Option<&str> {
        match self.in_ips.get(port) {
            Some(Ip::File(ip)) => Some(ip.path()),
            _ => None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Union of the tags of all inputs, later ports winning on conflicts.
    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        for ip in self.in_ips.values() {
            tags.extend(ip.tags());
        }
        tags
    }

    /// Resolve a `{t:...}` reference.
    ///
    /// `PORT.TAG` reads the tag from that in-port; a bare `TAG` is only
    /// accepted when the task has exactly one input.
    pub fn tag(&self, key: &str) -> Result<String, String> {
        if let Some((port, tag)) = key.split_once('.') {
            if let Some(ip) = self.in_ips.get(port) {
                return ip
                    .tag(tag)
                    .ok_or_else(|| format!("input on port '{port}' has no tag '{tag}'"));
            }
        }

        match self.in_ips.len() {
            1 => {
                let (port, ip) = self.in_ips.iter().next().ok_or("no inputs")?;
                ip.tag(key)
                    .ok_or_else(|| format!("input on port '{port}' has no tag '{key}'"))
            }
            0 => Err(format!("tag '{key}' requested but the task has no inputs")),
            n => Err(format!(
                "tag '{key}' is ambiguous between {n} inputs; use {{t:PORT.TAG}}"
            )),
        }
    }
}
