// src/components/params.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, SciPipeError};
use crate::port::{InPort, OutPort, ParamOutPort, PortCloser};
use crate::process::{ProcessFuture, RunContext, WorkflowProcess};
use crate::types::Params;

/// Emits parameter values on one param out-port per key.
///
/// Each round sends one value on every port. Rounds are either the values
/// taken in lockstep (`new`) or every combination of them (`cross_product`).
#[derive(Debug)]
pub struct ParamSource {
    name: String,
    ports: BTreeMap<String, ParamOutPort>,
    rounds: Vec<Params>,
}

impl ParamSource {
    /// Lockstep source: round `i` sends the `i`-th value of every key.
    pub fn new(name: impl Into<String>, values: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let name = name.into();

        let mut lengths = values.values().map(Vec::len);
        let len = lengths.next().unwrap_or(0);
        if lengths.any(|l| l != len) {
            return Err(SciPipeError::ConfigError(format!(
                "param source '{name}': value lists differ in length; use a cross product instead"
            )));
        }

        let rounds = (0..len)
            .map(|i| {
                values
                    .iter()
                    .map(|(key, vals)| (key.clone(), vals[i].clone()))
                    .collect()
            })
            .collect();

        Ok(Self::from_rounds(name, values.keys(), rounds))
    }

    /// Cross-product source: one round per combination, first key varying
    /// slowest.
    pub fn cross_product(name: impl Into<String>, values: BTreeMap<String, Vec<String>>) -> Self {
        let mut rounds = vec![Params::new()];
        for (key, vals) in &values {
            rounds = rounds
                .iter()
                .flat_map(|round| {
                    vals.iter().map(move |v| {
                        let mut next = round.clone();
                        next.insert(key.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        if values.is_empty() {
            rounds.clear();
        }

        Self::from_rounds(name.into(), values.keys(), rounds)
    }

    fn from_rounds<'a>(
        name: String,
        keys: impl Iterator<Item = &'a String>,
        rounds: Vec<Params>,
    ) -> Self {
        let ports = keys
            .map(|key| (key.clone(), ParamOutPort::new(name.clone(), key.clone())))
            .collect();
        Self {
            name,
            ports,
            rounds,
        }
    }

    pub fn out(&self, key: &str) -> Result<&ParamOutPort> {
        self.ports
            .get(key)
            .ok_or_else(|| SciPipeError::PortNotFound(format!("{}.{key}", self.name)))
    }

    /// Parameter sets in emission order.
    pub fn rounds(&self) -> &[Params] {
        &self.rounds
    }
}

impl WorkflowProcess for ParamSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_ports(&self) -> Vec<InPort> {
        Vec::new()
    }

    fn out_ports(&self) -> Vec<OutPort> {
        Vec::new()
    }

    fn param_out_ports(&self) -> Vec<ParamOutPort> {
        self.ports.values().cloned().collect()
    }

    fn run(self: Arc<Self>, _ctx: RunContext) -> ProcessFuture {
        Box::pin(async move {
            let _closer = PortCloser::new(Vec::new(), self.ports.values().cloned().collect());
            for round in &self.rounds {
                for (key, value) in round {
                    if let Some(port) = self.ports.get(key) {
                        port.send(value.clone()).await?;
                    }
                }
            }
            debug!(process = %self.name, rounds = self.rounds.len(), "params sent");
            Ok(())
        })
    }
}
