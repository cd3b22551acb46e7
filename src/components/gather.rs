// src/components/gather.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::ip::{Ip, SubStream};
use crate::port::{InPort, OutPort, PortCloser};
use crate::process::{ProcessFuture, RunContext, WorkflowProcess};

/// Collects every packet arriving on `in` into a single sub-stream packet
/// sent on `substream` once the input closes.
#[derive(Debug)]
pub struct SubStreamGatherer {
    name: String,
    input: InPort,
    out: OutPort,
}

impl SubStreamGatherer {
    pub const IN_PORT: &'static str = "in";
    pub const OUT_PORT: &'static str = "substream";

    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let name = name.into();
        Self {
            input: InPort::new(name.clone(), Self::IN_PORT, capacity),
            out: OutPort::new(name.clone(), Self::OUT_PORT),
            name,
        }
    }

    pub fn in_port(&self) -> &InPort {
        &self.input
    }

    pub fn out(&self) -> &OutPort {
        &self.out
    }
}

impl WorkflowProcess for SubStreamGatherer {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        vec![self.input.clone()]
    }

    fn out_ports(&self) -> Vec<OutPort> {
        vec![self.out.clone()]
    }

    fn run(self: Arc<Self>, _ctx: RunContext) -> ProcessFuture {
        Box::pin(async move {
            let _closer = PortCloser::new(vec![self.out.clone()], Vec::new());
            let mut rx = self.input.open()?;

            let mut members = Vec::new();
            while let Some(ip) = rx.recv().await {
                match ip {
                    Ip::File(file) => members.push(file),
                    Ip::SubStream(s) => members.extend(s.ips().iter().cloned()),
                }
            }

            debug!(process = %self.name, members = members.len(), "gathered sub-stream");
            self.out.send(Ip::SubStream(SubStream::new(members))).await?;
            Ok(())
        })
    }
}
