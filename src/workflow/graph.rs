// src/workflow/graph.rs

//! Process-level view of the port wiring.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::errors::{Result, SciPipeError};
use crate::port::PortAddr;

/// Directed graph with one node per process and one edge per connection,
/// labelled `out_port -> in_port`.
#[derive(Debug, Default)]
pub struct WorkflowGraph {
    graph: DiGraph<String, String>,
    index: BTreeMap<String, NodeIndex>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_process(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add a connection; processes are added on demand.
    pub fn add_connection(&mut self, from: &PortAddr, to: &PortAddr) {
        let a = self.add_process(&from.process);
        let b = self.add_process(&to.process);
        self.graph
            .add_edge(a, b, format!("{} -> {}", from.port, to.port));
    }

    pub fn contains(&self, process: &str) -> bool {
        self.index.contains_key(process)
    }

    /// The named processes plus every process they transitively read from.
    pub fn upstream_closure<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeSet<String>> {
        let reversed = Reversed(&self.graph);
        let mut closure = BTreeSet::new();

        for target in targets {
            let start = *self
                .index
                .get(target)
                .ok_or_else(|| SciPipeError::ProcessNotFound(target.to_string()))?;
            let mut dfs = Dfs::new(reversed, start);
            while let Some(node) = dfs.next(reversed) {
                closure.insert(self.graph[node].clone());
            }
        }
        Ok(closure)
    }

    /// Process names in dependency order, or the process found on a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .map_err(|cycle| {
                SciPipeError::Cycle(format!(
                    "connections loop back to process '{}'",
                    self.graph[cycle.node_id()]
                ))
            })
    }

    /// Graphviz DOT rendering.
    pub fn to_dot(&self) -> String {
        Dot::new(&self.graph).to_string()
    }
}
