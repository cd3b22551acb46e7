// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{ExecMode, Params};

/// Workflow file as read from TOML, before validation.
///
/// ```toml
/// [workflow]
/// name = "hello_world"
/// max_concurrent_tasks = 4
/// sink = ["world.out"]
///
/// [process.hello]
/// cmd = "echo 'Hello ' > {o:out}"
/// out = { out = "hello.txt" }
///
/// [process.world]
/// cmd = "echo $(cat {i:in}) World >> {o:out}"
/// out = { out = "{i:in|%.txt}_world.txt" }
/// in = { in = ["hello.out"] }
/// ```
///
/// Use `ConfigFile::try_from` to validate it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub workflow: WorkflowSection,

    /// Parameter sources from `[params.<name>]`.
    #[serde(default)]
    pub params: BTreeMap<String, ParamsConfig>,

    /// File sources from `[files.<name>]`.
    #[serde(default)]
    pub files: BTreeMap<String, FilesConfig>,

    /// Command processes from `[process.<name>]`.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessConfig>,
}

/// Validated workflow file.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub workflow: WorkflowSection,
    pub params: BTreeMap<String, ParamsConfig>,
    pub files: BTreeMap<String, FilesConfig>,
    pub process: BTreeMap<String, ProcessConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            workflow: raw.workflow,
            params: raw.params,
            files: raw.files,
            process: raw.process,
        }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Size of the global task semaphore; defaults to the number of CPUs.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Process run in the caller's future instead of the sink.
    #[serde(default)]
    pub driver: Option<String>,

    /// Out-ports (`node.port`) drained by the workflow sink.
    #[serde(default)]
    pub sink: Vec<String>,

    #[serde(default)]
    pub exec_mode: ExecMode,
}

fn default_workflow_name() -> String {
    "workflow".to_string()
}

fn default_max_concurrent_tasks() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            driver: None,
            sink: Vec::new(),
            exec_mode: ExecMode::default(),
        }
    }
}

/// `[params.<name>]` section: a parameter source.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamsConfig {
    /// Values per parameter port.
    pub values: BTreeMap<String, Vec<String>>,

    /// Emit every combination instead of the values in lockstep.
    #[serde(default)]
    pub combine: bool,
}

/// `[files.<name>]` section: either a fixed list of paths or a glob.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default)]
    pub paths: Vec<String>,

    /// Glob matched against paths relative to `root`.
    #[serde(default)]
    pub glob: Option<String>,

    /// Directory walked for `glob`; the current directory if absent.
    #[serde(default)]
    pub root: Option<String>,
}

/// `[process.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Command template, e.g. `"cat {i:in} > {o:out}"`.
    pub cmd: String,

    /// Output path pattern per out-port.
    #[serde(default)]
    pub out: BTreeMap<String, String>,

    /// Upstream `node.port` addresses per in-port or parameter port.
    #[serde(default, rename = "in")]
    pub inputs: BTreeMap<String, Vec<String>>,

    /// Static values inlined for `{p:...}` placeholders.
    #[serde(default)]
    pub params: Params,

    /// Out-ports written through a FIFO.
    #[serde(default)]
    pub stream: Vec<String>,

    #[serde(default)]
    pub prepend: Option<String>,

    #[serde(default = "default_cores")]
    pub cores: usize,
}

fn default_cores() -> usize {
    1
}
