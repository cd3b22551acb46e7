// src/process/mod.rs

//! Long-running workflow processes.
//!
//! Every node of a workflow implements [`WorkflowProcess`]: it exposes its
//! ports so the workflow can validate wiring, and it runs as one supervisor
//! future until its inputs are exhausted.
//!
//! - [`shell`] has [`Process`], the command-template process.
//! - [`supervisor`] is the scheduling loop that turns inputs into tasks.

pub mod shell;
mod supervisor;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use shell::Process;

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::port::{InPort, OutPort, ParamInPort, ParamOutPort, PortAddr};
use crate::workflow::slots::SlotPool;

/// Boxed future returned by [`WorkflowProcess::run`].
pub type ProcessFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Shared resources handed to every process when a workflow runs.
#[derive(Clone)]
pub struct RunContext {
    pub slots: SlotPool,
    pub backend: Arc<dyn ExecutorBackend>,
}

/// Capability every workflow node provides.
pub trait WorkflowProcess: Send + Sync {
    fn name(&self) -> &str;

    fn in_ports(&self) -> Vec<InPort>;

    fn out_ports(&self) -> Vec<OutPort>;

    fn param_in_ports(&self) -> Vec<ParamInPort> {
        Vec::new()
    }

    fn param_out_ports(&self) -> Vec<ParamOutPort> {
        Vec::new()
    }

    /// Ports that still need a connection.
    fn unconnected_ports(&self) -> Vec<PortAddr> {
        let mut missing: Vec<PortAddr> = Vec::new();
        missing.extend(
            self.in_ports()
                .iter()
                .filter(|p| !p.is_connected())
                .map(|p| p.addr().clone()),
        );
        missing.extend(
            self.param_in_ports()
                .iter()
                .filter(|p| !p.is_connected())
                .map(|p| p.addr().clone()),
        );
        missing.extend(
            self.out_ports()
                .iter()
                .filter(|p| !p.is_connected())
                .map(|p| p.addr().clone()),
        );
        missing.extend(
            self.param_out_ports()
                .iter()
                .filter(|p| !p.is_connected())
                .map(|p| p.addr().clone()),
        );
        missing
    }

    /// Ok when every port is connected, else the unconnected ones.
    fn connected(&self) -> std::result::Result<(), Vec<PortAddr>> {
        let missing = self.unconnected_ports();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Run until all inputs are consumed; out-ports are closed on return.
    fn run(self: Arc<Self>, ctx: RunContext) -> ProcessFuture;
}
