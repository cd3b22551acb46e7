// src/task/mod.rs

//! Concrete task invocations.
//!
//! A [`Task`] is one run of a process's command for one set of inputs and
//! parameters. It is fully resolved when built: output paths are decided by
//! the process's path formatters and the command template is expanded.
//!
//! - [`inputs`] holds [`TaskInputs`], what the process received for a task.
//! - [`workdir`] names the temporary directory a task runs in.
//! - [`finalize`] atomizes outputs and writes audit files.

pub mod finalize;
pub mod inputs;
pub mod workdir;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

pub use inputs::TaskInputs;

use crate::errors::{Result, SciPipeError};
use crate::exec::{CommandRequest, ExecutorBackend};
use crate::ip::paths::relative_to_workdir;
use crate::ip::{AuditInfo, FileIp, Ip};
use crate::template::{CommandTemplate, PathFormatter, PlaceholderKind};
use crate::types::Tags;

/// Closure replacing shell execution for a task.
///
/// It runs on a blocking thread with the process's working directory as
/// CWD and must write every regular output to [`Task::out_temp_path`].
pub type CustomExecute = Arc<dyn Fn(&Task) -> anyhow::Result<()> + Send + Sync>;

/// Everything a process fixes before its first task: shared by all tasks.
#[derive(Clone)]
pub struct TaskBlueprint {
    pub process: String,
    pub template: CommandTemplate,
    pub in_ports: Vec<String>,
    pub param_ports: Vec<String>,
    pub path_formatters: BTreeMap<String, PathFormatter>,
    pub stream_outs: BTreeSet<String>,
    pub prepend: Option<String>,
    pub cores: usize,
    pub custom_execute: Option<CustomExecute>,
}

impl fmt::Debug for TaskBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBlueprint")
            .field("process", &self.process)
            .field("template", &self.template.raw())
            .field("in_ports", &self.in_ports)
            .field("param_ports", &self.param_ports)
            .field("path_formatters", &self.path_formatters)
            .field("stream_outs", &self.stream_outs)
            .field("cores", &self.cores)
            .finish_non_exhaustive()
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The command ran and outputs were finalized.
    Executed,
    /// Every regular output already existed.
    SkippedOutputsExist,
    /// A leftover temp file was found.
    SkippedTempExists,
    /// A FIFO for a streaming output already existed.
    SkippedFifoExists,
}

/// One concrete invocation of a process command.
pub struct Task {
    process: String,
    command: String,
    inputs: TaskInputs,
    out_ips: BTreeMap<String, Arc<FileIp>>,
    tags: Tags,
    workdir: PathBuf,
    cores: usize,
    custom_execute: Option<CustomExecute>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("process", &self.process)
            .field("command", &self.command)
            .field("inputs", &self.inputs)
            .field("out_ips", &self.out_ips)
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Resolve outputs and the command for one set of inputs.
    pub fn build(blueprint: &TaskBlueprint, inputs: TaskInputs) -> Result<Self> {
        let missing = blueprint
            .in_ports
            .iter()
            .find(|p| !inputs.in_ips.contains_key(*p))
            .or_else(|| {
                blueprint
                    .param_ports
                    .iter()
                    .find(|p| !inputs.params.contains_key(*p))
            });
        if let Some(port) = missing {
            return Err(SciPipeError::MissingInput {
                process: blueprint.process.clone(),
                port: port.clone(),
            });
        }

        let tags = inputs.tags();

        let mut out_ips = BTreeMap::new();
        for (port, formatter) in &blueprint.path_formatters {
            let path = formatter.format(&inputs)?;
            let ip = if blueprint.stream_outs.contains(port) {
                FileIp::new_streaming(path)?
            } else {
                FileIp::new(path)?
            };
            ip.add_tags(&tags);
            out_ips.insert(port.clone(), Arc::new(ip));
        }

        let command = expand_command(&blueprint.template, &inputs, &out_ips)?;
        let command = match blueprint.prepend.as_deref() {
            Some(prepend) if !prepend.is_empty() => format!("{prepend} {command}"),
            _ => command,
        };

        let workdir = PathBuf::from(workdir::workdir_name(
            &blueprint.process,
            inputs.in_ips.values(),
            &inputs.params,
        ));

        Ok(Self {
            process: blueprint.process.clone(),
            command,
            inputs,
            out_ips,
            tags,
            workdir,
            cores: blueprint.cores,
            custom_execute: blueprint.custom_execute.clone(),
        })
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    /// The fully expanded command.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn inputs(&self) -> &TaskInputs {
        &self.inputs
    }

    pub fn params(&self) -> &crate::types::Params {
        &self.inputs.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.inputs.param(name)
    }

    pub fn in_ip(&self, port: &str) -> Option<&Ip> {
        self.inputs.in_ip(port)
    }

    /// Path to read the input on `port` from (FIFO for streamed inputs).
    pub fn in_path(&self, port: &str) -> Option<String> {
        match self.inputs.in_ip(port) {
            Some(Ip::File(ip)) => Some(ip.read_path()),
            _ => None,
        }
    }

    pub fn out_ips(&self) -> &BTreeMap<String, Arc<FileIp>> {
        &self.out_ips
    }

    pub fn out_ip(&self, port: &str) -> Option<&Arc<FileIp>> {
        self.out_ips.get(port)
    }

    /// Where a custom execute closure must write the output on `port`.
    pub fn out_temp_path(&self, port: &str) -> Option<String> {
        self.out_ips.get(port).map(|ip| {
            if ip.is_streaming() {
                ip.fifo_path()
            } else {
                ip.temp_path()
            }
        })
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Streaming outputs, which are published before the task runs.
    pub fn streaming_outputs(&self) -> impl Iterator<Item = (&String, &Arc<FileIp>)> {
        self.out_ips.iter().filter(|(_, ip)| ip.is_streaming())
    }

    /// Regular outputs, published once the task is done.
    pub fn regular_outputs(&self) -> impl Iterator<Item = (&String, &Arc<FileIp>)> {
        self.out_ips.iter().filter(|(_, ip)| !ip.is_streaming())
    }

    /// True if a FIFO of a streaming output is already on disk.
    pub fn any_fifo_exists(&self) -> bool {
        self.streaming_outputs().any(|(_, ip)| ip.fifo_exists())
    }

    /// Run the task: skip checks, command, atomize, audit.
    pub async fn execute(self: Arc<Self>, backend: Arc<dyn ExecutorBackend>) -> Result<TaskOutcome> {
        if let Some(outcome) = self.skip_reason() {
            return Ok(outcome);
        }
        self.run(backend).await
    }

    /// Run the task without the skip checks; the caller has made them.
    pub(crate) async fn run(self: Arc<Self>, backend: Arc<dyn ExecutorBackend>) -> Result<TaskOutcome> {
        for (_, ip) in self.regular_outputs() {
            ip.ensure_parent_dir()?;
        }
        tokio::fs::create_dir_all(&self.workdir).await?;

        let mut audit = AuditInfo::started(&self.process, &self.command, &self.inputs.params);
        info!(process = %self.process, command = %self.command, "executing task");

        if let Err(e) = self.run_command(backend).await {
            self.remove_workdir().await;
            return Err(e);
        }

        audit.finish(Utc::now());
        audit.tags = self.tags.clone();
        for (port, ip) in &self.inputs.in_ips {
            audit.upstream_audit_infos.extend(ip.audit_infos(port));
        }

        finalize::finalize_outputs(&self.out_ips, &audit).await?;
        self.remove_workdir().await;

        debug!(
            process = %self.process,
            exec_time_ms = audit.exec_time_ns / 1_000_000,
            "task finished"
        );
        Ok(TaskOutcome::Executed)
    }

    /// Why the task should not run, if it should not.
    ///
    /// Tasks that stream an output or read a streamed input always run when
    /// all regular outputs exist: their FIFO peer needs them. A leftover temp
    /// file skips any task.
    pub fn skip_reason(&self) -> Option<TaskOutcome> {
        let regular: Vec<&Arc<FileIp>> = self.regular_outputs().map(|(_, ip)| ip).collect();
        let streams = self.streaming_outputs().next().is_some()
            || self.inputs.in_ips.values().any(Ip::is_streaming);

        if !regular.is_empty() && !streams && regular.iter().all(|ip| ip.exists()) {
            info!(
                process = %self.process,
                outputs = ?regular.iter().map(|ip| ip.path()).collect::<Vec<_>>(),
                "all outputs exist; skipping task"
            );
            return Some(TaskOutcome::SkippedOutputsExist);
        }

        if let Some(ip) = regular.iter().find(|ip| ip.temp_exists()) {
            warn!(
                process = %self.process,
                temp = %ip.temp_path(),
                "temp file already exists, probably from an unfinished run; \
                 skipping task (remove the file to run it again)"
            );
            return Some(TaskOutcome::SkippedTempExists);
        }

        None
    }

    async fn run_command(self: &Arc<Self>, backend: Arc<dyn ExecutorBackend>) -> Result<()> {
        if let Some(execute) = self.custom_execute.clone() {
            let task = Arc::clone(self);
            let res = tokio::task::spawn_blocking(move || execute(&task)).await?;
            return res.map_err(|e| SciPipeError::CommandFailed {
                process: self.process.clone(),
                command: self.command.clone(),
                code: None,
                output: format!("{e:#}"),
            });
        }

        let output = backend
            .run_command(CommandRequest {
                process: self.process.clone(),
                command: self.command.clone(),
                workdir: self.workdir.clone(),
            })
            .await?;

        if !output.success() {
            error!(
                process = %self.process,
                command = %self.command,
                exit_code = ?output.code,
                output = %output.output,
                "command failed"
            );
            return Err(SciPipeError::CommandFailed {
                process: self.process.clone(),
                command: self.command.clone(),
                code: output.code,
                output: output.output,
            });
        }
        Ok(())
    }

    async fn remove_workdir(&self) {
        // Only removes an empty directory; anything the command left there stays.
        if let Err(e) = tokio::fs::remove_dir(&self.workdir).await {
            debug!(
                workdir = %self.workdir.display(),
                error = %e,
                "workdir not removed"
            );
        }
    }
}

/// Substitute a command template for one task.
fn expand_command(
    template: &CommandTemplate,
    inputs: &TaskInputs,
    out_ips: &BTreeMap<String, Arc<FileIp>>,
) -> Result<String> {
    template.expand(|ph| {
        let paths = match ph.kind {
            PlaceholderKind::In | PlaceholderKind::InStream => {
                let force_fifo = ph.kind == PlaceholderKind::InStream;
                let read = |ip: &FileIp| {
                    if force_fifo {
                        ip.fifo_path()
                    } else {
                        ip.read_path()
                    }
                };
                match inputs.in_ip(&ph.name) {
                    Some(Ip::File(ip)) => vec![read(ip.as_ref())],
                    Some(Ip::SubStream(s)) => {
                        if ph.reduce_sep.is_none() {
                            return Err(template.placeholder_error(
                                ph,
                                "sub-stream input needs a reduce separator ({i:NAME:r:SEP})",
                            ));
                        }
                        s.ips().iter().map(|ip| read(ip.as_ref())).collect()
                    }
                    None => return Err(template.placeholder_error(ph, "no input on this port")),
                }
            }
            PlaceholderKind::Out | PlaceholderKind::OutStream => match out_ips.get(&ph.name) {
                Some(ip) if ip.is_streaming() => vec![ip.fifo_path()],
                Some(ip) => vec![ip.temp_path()],
                None => return Err(template.placeholder_error(ph, "no path formatter for this out-port")),
            },
            PlaceholderKind::Param => {
                return inputs
                    .param(&ph.name)
                    .map(|v| vec![v.to_string()])
                    .ok_or_else(|| template.placeholder_error(ph, "no value for parameter"));
            }
            PlaceholderKind::Tag => {
                return inputs
                    .tag(&ph.name)
                    .map(|v| vec![v])
                    .map_err(|reason| template.placeholder_error(ph, reason));
            }
        };
        Ok(paths.iter().map(|p| relative_to_workdir(p)).collect())
    })
}
