use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

/// Parameter values of a task, keyed by parameter port name.
pub type Params = BTreeMap<String, String>;

/// Tags attached to an information packet.
pub type Tags = BTreeMap<String, String>;

/// Where task commands are executed.
///
/// Only local shell execution exists today; the enum is the hook through
/// which other backends would be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Run commands with `bash -lc` on this machine.
    Local,
}

impl Default for ExecMode {
    fn default() -> Self {
        ExecMode::Local
    }
}

impl FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ExecMode::Local),
            other => Err(format!(
                "invalid exec_mode: {other} (expected \"local\")"
            )),
        }
    }
}
