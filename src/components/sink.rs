// src/components/sink.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::errors::Result;
use crate::ip::Ip;
use crate::port::{InPort, OutPort, ParamInPort, ParamOutPort, PortAddr};
use crate::process::{ProcessFuture, RunContext, WorkflowProcess};

/// Drains any number of out-ports.
///
/// Everything connected to the sink is merged into one in-port (and one
/// parameter in-port); the paths and values that arrive are recorded in
/// arrival order.
#[derive(Debug)]
pub struct Sink {
    name: String,
    input: InPort,
    param_input: ParamInPort,
    received: Mutex<Vec<String>>,
    received_params: Mutex<Vec<String>>,
}

impl Sink {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        Self {
            input: InPort::new(name.clone(), "in", capacity),
            param_input: ParamInPort::new(name.clone(), "params", capacity),
            name,
            received: Mutex::new(Vec::new()),
            received_params: Mutex::new(Vec::new()),
        }
    }

    pub fn connect(&self, from: &OutPort) -> Result<()> {
        from.connect(&self.input)
    }

    pub fn connect_param(&self, from: &ParamOutPort) -> Result<()> {
        from.connect(&self.param_input)
    }

    /// True when at least one port feeds the sink.
    pub fn is_connected(&self) -> bool {
        self.input.is_connected() || self.param_input.is_connected()
    }

    /// Out-ports feeding the sink.
    pub fn upstream(&self) -> Vec<PortAddr> {
        let mut ports = self.input.upstream();
        ports.extend(self.param_input.upstream());
        ports
    }

    /// Paths received so far; sub-streams contribute each member.
    pub fn received(&self) -> Vec<String> {
        lock(&self.received).clone()
    }

    pub fn received_params(&self) -> Vec<String> {
        lock(&self.received_params).clone()
    }
}

impl WorkflowProcess for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        vec![self.input.clone()]
    }

    fn out_ports(&self) -> Vec<OutPort> {
        Vec::new()
    }

    fn param_in_ports(&self) -> Vec<ParamInPort> {
        vec![self.param_input.clone()]
    }

    /// A sink may be left unconnected; it then receives nothing.
    fn unconnected_ports(&self) -> Vec<PortAddr> {
        Vec::new()
    }

    fn run(self: Arc<Self>, _ctx: RunContext) -> ProcessFuture {
        Box::pin(async move {
            let mut ips = self.input.open()?;
            let mut params = self.param_input.open()?;

            let drain_ips = async {
                while let Some(ip) = ips.recv().await {
                    let paths: Vec<String> = match &ip {
                        Ip::File(file) => vec![file.path().to_string()],
                        Ip::SubStream(s) => s.ips().iter().map(|f| f.path().to_string()).collect(),
                    };
                    debug!(process = %self.name, paths = ?paths, "sink received");
                    lock(&self.received).extend(paths);
                }
            };
            let drain_params = async {
                while let Some(value) = params.recv().await {
                    lock(&self.received_params).push(value);
                }
            };
            tokio::join!(drain_ips, drain_params);

            debug!(process = %self.name, "sink drained");
            Ok(())
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
