// src/workflow/mod.rs

//! Workflow registry and driver.
//!
//! A [`Workflow`] owns every process, validates the wiring and runs one
//! supervisor future per process:
//!
//! - the *driver* runs in the caller's future; it is the explicitly set
//!   driver, else the sink when something is connected to it, else the last
//!   added process;
//! - every other process runs in its own tokio task;
//! - the first error aborts every process.
//!
//! - [`graph`] builds the process graph (cycles, upstream closure, DOT).
//! - [`slots`] is the global task admission semaphore.

pub mod graph;
pub mod slots;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::components::{FileGlobber, FileSource, ParamSource, Sink, SubStreamGatherer};
use crate::errors::{Result, SciPipeError};
use crate::exec::{ExecutorBackend, ShellBackend};
use crate::port::buffer::buffer_size_from_env;
use crate::port::{OutPort, ParamOutPort, PortAddr};
use crate::process::{Process, RunContext, WorkflowProcess};
use crate::types::{ExecMode, Params};

pub use graph::WorkflowGraph;
pub use slots::SlotPool;

/// Name of the sink every workflow owns.
pub const SINK_NAME: &str = "sink";

/// Name of the sink that drains target processes in a partial run.
pub const RUN_TO_SINK_NAME: &str = "run_to_sink";

pub struct Workflow {
    name: String,
    max_concurrent_tasks: usize,
    capacity: usize,
    processes: Vec<Arc<dyn WorkflowProcess>>,
    sink: Arc<Sink>,
    driver: Option<String>,
    backend: Arc<dyn ExecutorBackend>,
    exec_mode: ExecMode,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("max_concurrent_tasks", &self.max_concurrent_tasks)
            .field("capacity", &self.capacity)
            .field("processes", &self.process_names())
            .field("driver", &self.driver)
            .field("exec_mode", &self.exec_mode)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Create a workflow; the port capacity comes from `SCIPIPE_BUFSIZE`.
    pub fn new(name: impl Into<String>, max_concurrent_tasks: usize) -> Result<Self> {
        Ok(Self::with_capacity(name, max_concurrent_tasks, buffer_size_from_env()?))
    }

    /// Create a workflow with an explicit port capacity.
    pub fn with_capacity(
        name: impl Into<String>,
        max_concurrent_tasks: usize,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            max_concurrent_tasks: max_concurrent_tasks.max(1),
            capacity,
            processes: Vec::new(),
            sink: Arc::new(Sink::new(SINK_NAME, capacity)),
            driver: None,
            backend: Arc::new(ShellBackend::new()),
            exec_mode: ExecMode::default(),
        }
    }

    /// Replace the executor backend (shell by default).
    pub fn with_backend(mut self, backend: Arc<dyn ExecutorBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_exec_mode(mut self, mode: ExecMode) -> Self {
        self.exec_mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    /// Create a command process and register it.
    pub fn new_proc(&mut self, name: &str, command: &str) -> Result<Arc<Process>> {
        self.new_proc_with_params(name, command, &Params::new())
    }

    /// Create a command process whose `{p:...}` placeholders found in
    /// `static_params` are inlined instead of becoming ports.
    pub fn new_proc_with_params(
        &mut self,
        name: &str,
        command: &str,
        static_params: &Params,
    ) -> Result<Arc<Process>> {
        let process = Process::with_params(name, command, static_params, self.capacity)?;
        self.add_process(Arc::new(process))
    }

    pub fn new_param_source(
        &mut self,
        name: &str,
        values: std::collections::BTreeMap<String, Vec<String>>,
    ) -> Result<Arc<ParamSource>> {
        self.add_process(Arc::new(ParamSource::new(name, values)?))
    }

    pub fn new_param_cross_product(
        &mut self,
        name: &str,
        values: std::collections::BTreeMap<String, Vec<String>>,
    ) -> Result<Arc<ParamSource>> {
        self.add_process(Arc::new(ParamSource::cross_product(name, values)))
    }

    pub fn new_file_source(&mut self, name: &str, paths: Vec<String>) -> Result<Arc<FileSource>> {
        self.add_process(Arc::new(FileSource::new(name, paths)?))
    }

    pub fn new_file_globber(
        &mut self,
        name: &str,
        root: impl Into<PathBuf>,
        pattern: &str,
    ) -> Result<Arc<FileGlobber>> {
        self.add_process(Arc::new(FileGlobber::new(name, root, pattern)?))
    }

    pub fn new_substream_gatherer(&mut self, name: &str) -> Result<Arc<SubStreamGatherer>> {
        let capacity = self.capacity;
        self.add_process(Arc::new(SubStreamGatherer::new(name, capacity)))
    }

    /// Register a process. Names are unique within a workflow.
    pub fn add_process<P>(&mut self, process: Arc<P>) -> Result<Arc<P>>
    where
        P: WorkflowProcess + 'static,
    {
        let name = process.name();
        if name == SINK_NAME || name == RUN_TO_SINK_NAME || self.process(name).is_some() {
            return Err(SciPipeError::ConfigError(format!(
                "workflow '{}' already has a process named '{name}'",
                self.name
            )));
        }
        debug!(workflow = %self.name, process = %name, "added process");
        let erased: Arc<dyn WorkflowProcess> = process.clone();
        self.processes.push(erased);
        Ok(process)
    }

    pub fn process(&self, name: &str) -> Option<&Arc<dyn WorkflowProcess>> {
        self.processes.iter().find(|p| p.name() == name)
    }

    /// Process names in the order they were added.
    pub fn process_names(&self) -> Vec<&str> {
        self.processes.iter().map(|p| p.name()).collect()
    }

    pub fn processes(&self) -> &[Arc<dyn WorkflowProcess>] {
        &self.processes
    }

    pub fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    pub fn add_to_sink(&self, port: &OutPort) -> Result<()> {
        self.sink.connect(port)
    }

    pub fn add_param_to_sink(&self, port: &ParamOutPort) -> Result<()> {
        self.sink.connect_param(port)
    }

    /// Run `name` in the caller's future instead of the default driver.
    pub fn set_driver(&mut self, name: &str) -> Result<()> {
        if self.process(name).is_none() {
            return Err(SciPipeError::ProcessNotFound(name.to_string()));
        }
        self.driver = Some(name.to_string());
        Ok(())
    }

    /// Connect two ports given as `process.port`; `sink` as target means the
    /// workflow sink.
    pub fn connect(&self, from: &str, to: &str) -> Result<()> {
        let (from_proc, from_port) = split_addr(from)?;
        let source = self
            .process(from_proc)
            .ok_or_else(|| SciPipeError::ProcessNotFound(from_proc.to_string()))?;

        let out = source.out_ports().into_iter().find(|p| p.name() == from_port);
        let param_out = source
            .param_out_ports()
            .into_iter()
            .find(|p| p.name() == from_port);

        if to == SINK_NAME {
            return match (out, param_out) {
                (Some(out), _) => self.add_to_sink(&out),
                (None, Some(param_out)) => self.add_param_to_sink(&param_out),
                (None, None) => Err(SciPipeError::PortNotFound(from.to_string())),
            };
        }

        let (to_proc, to_port) = split_addr(to)?;
        let target = self
            .process(to_proc)
            .ok_or_else(|| SciPipeError::ProcessNotFound(to_proc.to_string()))?;

        if let Some(out) = out {
            let inport = target
                .in_ports()
                .into_iter()
                .find(|p| p.name() == to_port)
                .ok_or_else(|| SciPipeError::PortNotFound(to.to_string()))?;
            return out.connect(&inport);
        }
        if let Some(param_out) = param_out {
            let inport = target
                .param_in_ports()
                .into_iter()
                .find(|p| p.name() == to_port)
                .ok_or_else(|| SciPipeError::PortNotFound(to.to_string()))?;
            return param_out.connect(&inport);
        }
        Err(SciPipeError::PortNotFound(from.to_string()))
    }

    /// Every port of every registered process that lacks a connection.
    pub fn unconnected_ports(&self) -> Vec<PortAddr> {
        self.processes
            .iter()
            .flat_map(|p| p.unconnected_ports())
            .collect()
    }

    /// Process graph of the current wiring, the sink included when used.
    pub fn graph(&self) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        for process in &self.processes {
            graph.add_process(process.name());
        }
        if self.sink.is_connected() {
            graph.add_process(SINK_NAME);
        }
        for process in &self.processes {
            for out in process.out_ports() {
                for to in out.downstream() {
                    graph.add_connection(out.addr(), &to);
                }
            }
            for out in process.param_out_ports() {
                for to in out.downstream() {
                    graph.add_connection(out.addr(), &to);
                }
            }
        }
        graph
    }

    /// Graphviz DOT rendering of the process graph.
    pub fn to_dot(&self) -> String {
        self.graph().to_dot()
    }

    /// Check that every port is connected and the graph has no cycle.
    pub fn validate(&self) -> Result<()> {
        let missing = self.unconnected_ports();
        if !missing.is_empty() {
            for port in &missing {
                warn!(workflow = %self.name, port = %port, "port is not connected");
            }
            return Err(SciPipeError::UnconnectedPorts {
                workflow: self.name.clone(),
                ports: missing.iter().map(ToString::to_string).collect(),
            });
        }
        self.graph().topological_order()?;
        Ok(())
    }

    /// Run the whole workflow to completion.
    pub async fn run(self) -> Result<()> {
        self.validate()?;

        let driver: Arc<dyn WorkflowProcess> = match &self.driver {
            Some(name) => self
                .process(name)
                .cloned()
                .ok_or_else(|| SciPipeError::ProcessNotFound(name.clone()))?,
            None if self.sink.is_connected() => self.sink.clone() as Arc<dyn WorkflowProcess>,
            None => self.processes.last().cloned().ok_or_else(|| {
                SciPipeError::ConfigError(format!("workflow '{}' has no processes", self.name))
            })?,
        };

        let mut processes = self.processes.clone();
        if self.sink.is_connected() {
            processes.push(self.sink.clone());
        }

        self.execute(processes, driver).await
    }

    /// Run only `name` and the processes it depends on.
    pub async fn run_to_process(self, name: &str) -> Result<()> {
        self.run_to_processes(&[name]).await
    }

    /// Run only the named processes and their upstream closure.
    ///
    /// Connections into processes outside that set are detached, and the
    /// outputs of the named processes that end up unconnected are drained by
    /// an internal sink, which drives the run.
    pub async fn run_to_processes(self, names: &[&str]) -> Result<()> {
        self.validate()?;

        for name in names {
            if self.process(name).is_none() {
                return Err(SciPipeError::ProcessNotFound(name.to_string()));
            }
        }

        let keep: BTreeSet<String> = self.graph().upstream_closure(names.iter().copied())?;
        info!(
            workflow = %self.name,
            targets = ?names,
            running = ?keep,
            "running to selected processes"
        );

        let kept: Vec<Arc<dyn WorkflowProcess>> = self
            .processes
            .iter()
            .filter(|p| keep.contains(p.name()))
            .cloned()
            .collect();

        let excluded = |process: &str| !keep.contains(process);
        for process in &kept {
            for out in process.out_ports() {
                out.detach_where(excluded);
            }
            for out in process.param_out_ports() {
                out.detach_where(excluded);
            }
        }

        let run_to_sink = Arc::new(Sink::new(RUN_TO_SINK_NAME, self.capacity));
        for process in kept.iter().filter(|p| names.iter().any(|n| *n == p.name())) {
            for out in process.out_ports().iter().filter(|o| !o.is_connected()) {
                run_to_sink.connect(out)?;
            }
            for out in process.param_out_ports().iter().filter(|o| !o.is_connected()) {
                run_to_sink.connect_param(out)?;
            }
        }

        let mut processes = kept;
        let driver: Arc<dyn WorkflowProcess> = run_to_sink;
        processes.push(driver.clone());

        self.execute(processes, driver).await
    }

    async fn execute(
        &self,
        processes: Vec<Arc<dyn WorkflowProcess>>,
        driver: Arc<dyn WorkflowProcess>,
    ) -> Result<()> {
        let ctx = RunContext {
            slots: SlotPool::new(self.max_concurrent_tasks),
            backend: Arc::clone(&self.backend),
        };

        info!(
            workflow = %self.name,
            processes = processes.len(),
            driver = %driver.name(),
            max_concurrent_tasks = self.max_concurrent_tasks,
            "starting workflow"
        );

        let mut others = JoinSet::new();
        for process in processes {
            if process.name() == driver.name() {
                continue;
            }
            let ctx = ctx.clone();
            others.spawn(async move {
                let name = process.name().to_string();
                let res = Arc::clone(&process).run(ctx).await;
                if let Err(e) = &res {
                    warn!(process = %name, error = %e, "process failed");
                }
                res
            });
        }

        let mut driver_run = Arc::clone(&driver).run(ctx);
        loop {
            tokio::select! {
                res = &mut driver_run => {
                    res?;
                    break;
                }
                Some(joined) = others.join_next() => {
                    joined??;
                }
            }
        }
        while let Some(joined) = others.join_next().await {
            joined??;
        }

        info!(workflow = %self.name, "workflow finished");
        Ok(())
    }
}

fn split_addr(addr: &str) -> Result<(&str, &str)> {
    addr.split_once('.')
        .filter(|(p, port)| !p.is_empty() && !port.is_empty())
        .ok_or_else(|| {
            SciPipeError::ConfigError(format!(
                "invalid port address '{addr}', expected 'process.port'"
            ))
        })
}
