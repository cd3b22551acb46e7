// src/process/supervisor.rs

//! Scheduling loop of a command process.
//!
//! The loop gathers one packet per in-port and one value per parameter port
//! into [`TaskInputs`], builds a task, takes its slots and spawns it.
//! Skip decisions are made here, before any FIFO of the task exists.
//! Streaming outputs are sent as soon as their FIFOs exist; regular outputs
//! are sent once the task is done, always in spawn order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Process, RunContext, WorkflowProcess};
use crate::errors::Result;
use crate::exec::make_fifo;
use crate::ip::Ip;
use crate::port::{InPort, OutPort, ParamInPort, PortCloser};
use crate::task::{Task, TaskInputs, TaskOutcome};

pub(super) async fn run_process(process: Arc<Process>, ctx: RunContext) -> Result<()> {
    let name = process.name().to_string();
    let out_ports = process.out_port_map();
    let _closer = PortCloser::new(out_ports.values().cloned().collect(), Vec::new());

    let blueprint = process.blueprint()?;
    ctx.slots.check(&name, blueprint.cores)?;

    let mut gatherer = InputGatherer::open(&name, process.in_port_map(), process.param_port_map())?;
    let mut spawned = SpawnedTasks::default();

    info!(process = %name, "process started");

    while let Some(inputs) = gatherer.next().await {
        spawned.collect_finished().await?;
        spawned.publish_ready(out_ports).await?;

        let task = Arc::new(Task::build(&blueprint, inputs)?);
        let permit = ctx.slots.acquire(task.cores()).await?;

        if task.any_fifo_exists() {
            warn!(
                process = %name,
                command = %task.command(),
                "fifo already exists, assuming another process is streaming it; not executing task"
            );
            drop(permit);
            spawned.push_done(task, TaskOutcome::SkippedFifoExists);
            continue;
        }
        if let Some(outcome) = task.skip_reason() {
            drop(permit);
            spawned.push_done(task, outcome);
            continue;
        }

        for (_, ip) in task.streaming_outputs() {
            make_fifo(&ip.fifo_path()).await?;
        }
        for (port, ip) in task.streaming_outputs() {
            if let Some(out) = out_ports.get(port) {
                out.send(Ip::File(Arc::clone(ip))).await?;
            }
        }

        let backend = Arc::clone(&ctx.backend);
        let running = Arc::clone(&task);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            running.run(backend).await
        });
        spawned.push_running(task, handle);
    }

    debug!(process = %name, pending = spawned.len(), "inputs exhausted; waiting for tasks");
    spawned.finish(out_ports).await?;

    info!(process = %name, "process finished");
    Ok(())
}

/// Reads the next complete set of task inputs from a process's ports.
struct InputGatherer {
    process: String,
    in_rx: Vec<(String, mpsc::Receiver<Ip>)>,
    param_rx: Vec<(String, mpsc::Receiver<String>)>,
    ran_once: bool,
}

impl InputGatherer {
    fn open(
        process: &str,
        in_ports: &BTreeMap<String, InPort>,
        param_ports: &BTreeMap<String, ParamInPort>,
    ) -> Result<Self> {
        let in_rx = in_ports
            .iter()
            .map(|(name, port)| port.open().map(|rx| (name.clone(), rx)))
            .collect::<Result<Vec<_>>>()?;
        let param_rx = param_ports
            .iter()
            .map(|(name, port)| port.open().map(|rx| (name.clone(), rx)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            process: process.to_string(),
            in_rx,
            param_rx,
            ran_once: false,
        })
    }

    /// Next task's inputs, or `None` once every port is closed.
    ///
    /// A process without any ports yields exactly one empty set of inputs.
    /// Rounds in which only some ports delivered cannot form a task; they are
    /// dropped and the remaining ports are drained until they close too.
    async fn next(&mut self) -> Option<TaskInputs> {
        if self.in_rx.is_empty() && self.param_rx.is_empty() {
            if self.ran_once {
                return None;
            }
            self.ran_once = true;
            return Some(TaskInputs::new(self.process.clone()));
        }

        loop {
            let mut inputs = TaskInputs::new(self.process.clone());
            let mut closed = Vec::new();

            for (port, rx) in &mut self.in_rx {
                match rx.recv().await {
                    Some(ip) => {
                        inputs.in_ips.insert(port.clone(), ip);
                    }
                    None => closed.push(port.clone()),
                }
            }
            for (port, rx) in &mut self.param_rx {
                match rx.recv().await {
                    Some(value) => {
                        inputs.params.insert(port.clone(), value);
                    }
                    None => closed.push(port.clone()),
                }
            }

            if closed.is_empty() {
                return Some(inputs);
            }
            if inputs.in_ips.is_empty() && inputs.params.is_empty() {
                return None;
            }
            warn!(
                process = %self.process,
                closed = ?closed,
                dropped = ?inputs.in_ips.keys().chain(inputs.params.keys()).collect::<Vec<_>>(),
                "some ports closed; dropping inputs that cannot form a task"
            );
        }
    }
}

struct SpawnedTask {
    task: Arc<Task>,
    handle: Option<JoinHandle<Result<TaskOutcome>>>,
    outcome: Option<TaskOutcome>,
}

/// Tasks of one process in spawn order. Dropping it aborts unfinished tasks.
#[derive(Default)]
struct SpawnedTasks {
    queue: VecDeque<SpawnedTask>,
}

impl SpawnedTasks {
    fn len(&self) -> usize {
        self.queue.len()
    }

    fn push_running(&mut self, task: Arc<Task>, handle: JoinHandle<Result<TaskOutcome>>) {
        self.queue.push_back(SpawnedTask {
            task,
            handle: Some(handle),
            outcome: None,
        });
    }

    fn push_done(&mut self, task: Arc<Task>, outcome: TaskOutcome) {
        self.queue.push_back(SpawnedTask {
            task,
            handle: None,
            outcome: Some(outcome),
        });
    }

    /// Reap tasks that already finished, returning the first failure.
    async fn collect_finished(&mut self) -> Result<()> {
        for spawned in self.queue.iter_mut() {
            if !spawned.handle.as_ref().is_some_and(JoinHandle::is_finished) {
                continue;
            }
            if let Some(handle) = spawned.handle.take() {
                spawned.outcome = Some(handle.await??);
            }
        }
        Ok(())
    }

    /// Send outputs of finished tasks at the front of the queue.
    async fn publish_ready(&mut self, out_ports: &BTreeMap<String, OutPort>) -> Result<()> {
        while self.queue.front().is_some_and(|s| s.outcome.is_some()) {
            if let Some(spawned) = self.queue.pop_front() {
                publish_regular(&spawned.task, out_ports).await?;
            }
        }
        Ok(())
    }

    /// Wait for every remaining task in order and send its outputs.
    async fn finish(&mut self, out_ports: &BTreeMap<String, OutPort>) -> Result<()> {
        while let Some(mut spawned) = self.queue.pop_front() {
            if let Some(handle) = spawned.handle.take() {
                let outcome = handle.await??;
                debug!(
                    process = %spawned.task.process(),
                    outcome = ?outcome,
                    "task done"
                );
            }
            publish_regular(&spawned.task, out_ports).await?;
        }
        Ok(())
    }
}

impl Drop for SpawnedTasks {
    fn drop(&mut self) {
        for spawned in &self.queue {
            if let Some(handle) = &spawned.handle {
                handle.abort();
            }
        }
    }
}

async fn publish_regular(task: &Task, out_ports: &BTreeMap<String, OutPort>) -> Result<()> {
    for (port, ip) in task.regular_outputs() {
        if let Some(out) = out_ports.get(port) {
            out.send(Ip::File(Arc::clone(ip))).await?;
        }
    }
    Ok(())
}
