// src/process/shell.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{ProcessFuture, RunContext, WorkflowProcess};
use crate::errors::{Result, SciPipeError};
use crate::port::{InPort, OutPort, ParamInPort};
use crate::task::{CustomExecute, Task, TaskBlueprint, TaskInputs};
use crate::template::{CommandTemplate, PathFormatter, PlaceholderKind};
use crate::types::Params;

/// A process wrapping a shell command template.
///
/// Ports are created from the template's placeholders when the process is
/// built:
///
/// - `{i:NAME}` / `{is:NAME}` become in-ports,
/// - `{o:NAME}` / `{os:NAME}` become out-ports (`os` marks them streaming),
/// - `{p:NAME}` becomes a parameter in-port unless a static value was given.
///
/// Every out-port needs a path formatter before the workflow runs.
pub struct Process {
    name: String,
    template: CommandTemplate,
    in_ports: BTreeMap<String, InPort>,
    out_ports: BTreeMap<String, OutPort>,
    param_ports: BTreeMap<String, ParamInPort>,
    settings: Mutex<ProcessSettings>,
}

#[derive(Default)]
struct ProcessSettings {
    path_formatters: BTreeMap<String, PathFormatter>,
    stream_outs: BTreeSet<String>,
    prepend: Option<String>,
    cores: usize,
    custom_execute: Option<CustomExecute>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("command", &self.template.raw())
            .field("in_ports", &self.in_ports.keys().collect::<Vec<_>>())
            .field("out_ports", &self.out_ports.keys().collect::<Vec<_>>())
            .field("param_ports", &self.param_ports.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Process {
    /// Build a process from a command template.
    pub fn new(name: impl Into<String>, command: &str, capacity: usize) -> Result<Self> {
        Self::with_params(name, command, &Params::new(), capacity)
    }

    /// Build a process, inlining static values for `{p:NAME}` placeholders.
    pub fn with_params(
        name: impl Into<String>,
        command: &str,
        static_params: &Params,
        capacity: usize,
    ) -> Result<Self> {
        let name = name.into();
        let template = CommandTemplate::parse_with_params(command, static_params)?;

        let in_ports = template
            .names_of(&[PlaceholderKind::In, PlaceholderKind::InStream])
            .into_iter()
            .map(|port| (port.clone(), InPort::new(name.clone(), port, capacity)))
            .collect();
        let out_ports = template
            .names_of(&[PlaceholderKind::Out, PlaceholderKind::OutStream])
            .into_iter()
            .map(|port| (port.clone(), OutPort::new(name.clone(), port)))
            .collect();
        let param_ports = template
            .names_of(&[PlaceholderKind::Param])
            .into_iter()
            .map(|port| (port.clone(), ParamInPort::new(name.clone(), port, capacity)))
            .collect();

        let stream_outs = template
            .names_of(&[PlaceholderKind::OutStream])
            .into_iter()
            .collect();

        debug!(process = %name, command = %template.raw(), "created process");

        Ok(Self {
            name,
            template,
            in_ports,
            out_ports,
            param_ports,
            settings: Mutex::new(ProcessSettings {
                stream_outs,
                cores: 1,
                ..ProcessSettings::default()
            }),
        })
    }

    pub fn command(&self) -> &str {
        self.template.raw()
    }

    pub fn in_port(&self, port: &str) -> Result<&InPort> {
        self.in_ports
            .get(port)
            .ok_or_else(|| SciPipeError::PortNotFound(format!("{}.{port}", self.name)))
    }

    pub fn out_port(&self, port: &str) -> Result<&OutPort> {
        self.out_ports
            .get(port)
            .ok_or_else(|| SciPipeError::PortNotFound(format!("{}.{port}", self.name)))
    }

    pub fn param_port(&self, port: &str) -> Result<&ParamInPort> {
        self.param_ports
            .get(port)
            .ok_or_else(|| SciPipeError::PortNotFound(format!("{}.{port}", self.name)))
    }

    pub fn set_path_formatter(&self, port: &str, formatter: PathFormatter) -> Result<()> {
        self.out_port(port)?;
        self.settings().path_formatters.insert(port.to_string(), formatter);
        Ok(())
    }

    /// Set the output path of `port` from a pattern such as
    /// `"{i:in|%.txt}.upper.txt"`, or a plain static path.
    pub fn set_out_path(&self, port: &str, pattern: &str) -> Result<()> {
        self.set_path_formatter(port, PathFormatter::parse(pattern)?)
    }

    /// Output path is the path on `in_port` plus `suffix`.
    pub fn set_out_extend(&self, port: &str, in_port: &str, suffix: &str) -> Result<()> {
        self.set_path_formatter(port, PathFormatter::extend(in_port, suffix))
    }

    /// Output path is the path on `in_port` with `old` replaced by `new`.
    pub fn set_out_replace(&self, port: &str, in_port: &str, old: &str, new: &str) -> Result<()> {
        self.set_path_formatter(port, PathFormatter::replace(in_port, old, new))
    }

    pub fn set_out_func<F>(&self, port: &str, f: F) -> Result<()>
    where
        F: Fn(&TaskInputs) -> Result<String> + Send + Sync + 'static,
    {
        self.set_path_formatter(port, PathFormatter::custom(f))
    }

    /// Mark an out-port as streaming through a FIFO.
    pub fn set_stream(&self, port: &str, stream: bool) -> Result<()> {
        self.out_port(port)?;
        let mut settings = self.settings();
        if stream {
            settings.stream_outs.insert(port.to_string());
        } else {
            settings.stream_outs.remove(port);
        }
        Ok(())
    }

    /// String put in front of every expanded command, e.g. `"srun"`.
    pub fn set_prepend(&self, prepend: impl Into<String>) {
        self.settings().prepend = Some(prepend.into());
    }

    pub fn set_cores(&self, cores: usize) {
        self.settings().cores = cores.max(1);
    }

    pub fn cores(&self) -> usize {
        self.settings().cores
    }

    /// Replace shell execution with a closure.
    pub fn set_custom_execute<F>(&self, f: F)
    where
        F: Fn(&Task) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.settings().custom_execute = Some(Arc::new(f));
    }

    /// Freeze the current settings into what every task is built from.
    pub fn blueprint(&self) -> Result<TaskBlueprint> {
        let settings = self.settings();

        for port in self.out_ports.keys() {
            if !settings.path_formatters.contains_key(port) {
                return Err(SciPipeError::ConfigError(format!(
                    "process '{}': no path formatter for out-port '{port}'",
                    self.name
                )));
            }
        }
        for formatter in settings.path_formatters.values() {
            for port in formatter.referenced_in_ports() {
                if !self.in_ports.contains_key(&port) {
                    return Err(SciPipeError::ConfigError(format!(
                        "process '{}': path formatter {formatter:?} reads unknown in-port '{port}'",
                        self.name
                    )));
                }
            }
        }

        Ok(TaskBlueprint {
            process: self.name.clone(),
            template: self.template.clone(),
            in_ports: self.in_ports.keys().cloned().collect(),
            param_ports: self.param_ports.keys().cloned().collect(),
            path_formatters: settings.path_formatters.clone(),
            stream_outs: settings.stream_outs.clone(),
            prepend: settings.prepend.clone(),
            cores: settings.cores,
            custom_execute: settings.custom_execute.clone(),
        })
    }

    pub(crate) fn in_port_map(&self) -> &BTreeMap<String, InPort> {
        &self.in_ports
    }

    pub(crate) fn out_port_map(&self) -> &BTreeMap<String, OutPort> {
        &self.out_ports
    }

    pub(crate) fn param_port_map(&self) -> &BTreeMap<String, ParamInPort> {
        &self.param_ports
    }

    fn settings(&self) -> MutexGuard<'_, ProcessSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkflowProcess for Process {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        self.in_ports.values().cloned().collect()
    }

    fn out_ports(&self) -> Vec<OutPort> {
        self.out_ports.values().cloned().collect()
    }

    fn param_in_ports(&self) -> Vec<ParamInPort> {
        self.param_ports.values().cloned().collect()
    }

    fn run(self: Arc<Self>, ctx: RunContext) -> ProcessFuture {
        Box::pin(super::supervisor::run_process(self, ctx))
    }
}
