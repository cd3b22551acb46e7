// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::components::files::OUT_PORT;
use crate::config::model::{ConfigFile, ProcessConfig, RawConfigFile};
use crate::errors::{Result, SciPipeError};
use crate::template::{CommandTemplate, PathFormatter, PlaceholderKind};
use crate::workflow::{RUN_TO_SINK_NAME, SINK_NAME};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SciPipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_processes(cfg)?;
    validate_workflow_section(cfg)?;
    validate_node_names(cfg)?;
    validate_files(cfg)?;

    let ports = node_ports(cfg)?;
    validate_processes(cfg, &ports)?;
    validate_connections(cfg, &ports)?;
    validate_dag(cfg)?;
    Ok(())
}

/// In- and out-port names of one workflow node.
#[derive(Debug, Default)]
struct NodePorts {
    inputs: BTreeSet<String>,
    outputs: BTreeSet<String>,
}

fn ensure_has_processes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.process.is_empty() {
        return Err(SciPipeError::ConfigError(
            "workflow must contain at least one [process.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.workflow.max_concurrent_tasks == 0 {
        return Err(SciPipeError::ConfigError(
            "[workflow].max_concurrent_tasks must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(driver) = &cfg.workflow.driver {
        if !node_names(cfg).any(|n| n == driver) {
            return Err(SciPipeError::ConfigError(format!(
                "[workflow].driver refers to unknown node '{driver}'"
            )));
        }
    }
    Ok(())
}

fn node_names(cfg: &RawConfigFile) -> impl Iterator<Item = &String> {
    cfg.params
        .keys()
        .chain(cfg.files.keys())
        .chain(cfg.process.keys())
}

fn validate_node_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in node_names(cfg) {
        if name.is_empty() || name.contains('.') {
            return Err(SciPipeError::ConfigError(format!(
                "invalid node name '{name}': must be non-empty and contain no '.'"
            )));
        }
        if name == SINK_NAME || name == RUN_TO_SINK_NAME {
            return Err(SciPipeError::ConfigError(format!(
                "node name '{name}' is reserved"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(SciPipeError::ConfigError(format!(
                "node name '{name}' is used by more than one section"
            )));
        }
    }
    Ok(())
}

fn validate_files(cfg: &RawConfigFile) -> Result<()> {
    for (name, files) in &cfg.files {
        match (&files.glob, files.paths.is_empty()) {
            (Some(_), false) => {
                return Err(SciPipeError::ConfigError(format!(
                    "[files.{name}] sets both `paths` and `glob`"
                )));
            }
            (None, true) => {
                return Err(SciPipeError::ConfigError(format!(
                    "[files.{name}] needs `paths` or `glob`"
                )));
            }
            (None, false) if files.root.is_some() => {
                return Err(SciPipeError::ConfigError(format!(
                    "[files.{name}] `root` is only used together with `glob`"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn process_template(name: &str, process: &ProcessConfig) -> Result<CommandTemplate> {
    CommandTemplate::parse_with_params(process.cmd.as_str(), &process.params).map_err(|e| {
        SciPipeError::ConfigError(format!("[process.{name}] has an invalid `cmd`: {e}"))
    })
}

fn node_ports(cfg: &RawConfigFile) -> Result<BTreeMap<String, NodePorts>> {
    let mut ports = BTreeMap::new();

    for (name, params) in &cfg.params {
        ports.insert(
            name.clone(),
            NodePorts {
                inputs: BTreeSet::new(),
                outputs: params.values.keys().cloned().collect(),
            },
        );
    }
    for name in cfg.files.keys() {
        ports.insert(
            name.clone(),
            NodePorts {
                inputs: BTreeSet::new(),
                outputs: BTreeSet::from([OUT_PORT.to_string()]),
            },
        );
    }
    for (name, process) in &cfg.process {
        let template = process_template(name, process)?;
        ports.insert(
            name.clone(),
            NodePorts {
                inputs: template
                    .names_of(&[
                        PlaceholderKind::In,
                        PlaceholderKind::InStream,
                        PlaceholderKind::Param,
                    ])
                    .into_iter()
                    .collect(),
                outputs: template
                    .names_of(&[PlaceholderKind::Out, PlaceholderKind::OutStream])
                    .into_iter()
                    .collect(),
            },
        );
    }

    Ok(ports)
}

fn validate_processes(cfg: &RawConfigFile, ports: &BTreeMap<String, NodePorts>) -> Result<()> {
    let max = cfg.workflow.max_concurrent_tasks;

    for (name, process) in &cfg.process {
        let Some(node) = ports.get(name) else {
            continue;
        };

        for port in &node.outputs {
            if !process.out.contains_key(port) {
                return Err(SciPipeError::ConfigError(format!(
                    "[process.{name}] out-port '{port}' has no path in `out`"
                )));
            }
        }
        for (port, pattern) in &process.out {
            if !node.outputs.contains(port) {
                return Err(SciPipeError::ConfigError(format!(
                    "[process.{name}] `out` names '{port}', which is not an output placeholder of `cmd`"
                )));
            }
            PathFormatter::parse(pattern).map_err(|e| {
                SciPipeError::ConfigError(format!(
                    "[process.{name}] invalid path pattern for '{port}': {e}"
                ))
            })?;
        }

        for port in &node.inputs {
            if process.inputs.get(port).is_none_or(Vec::is_empty) {
                return Err(SciPipeError::ConfigError(format!(
                    "[process.{name}] in-port '{port}' has no upstream in `in`"
                )));
            }
        }
        for port in process.inputs.keys() {
            if !node.inputs.contains(port) {
                return Err(SciPipeError::ConfigError(format!(
                    "[process.{name}] `in` names '{port}', which is not an input or parameter placeholder of `cmd`"
                )));
            }
        }

        for port in &process.stream {
            if !node.outputs.contains(port) {
                return Err(SciPipeError::ConfigError(format!(
                    "[process.{name}] `stream` names unknown out-port '{port}'"
                )));
            }
        }

        if process.cores == 0 || process.cores > max {
            return Err(SciPipeError::ConfigError(format!(
                "[process.{name}] cores must be between 1 and max_concurrent_tasks ({max}), got {}",
                process.cores
            )));
        }
    }
    Ok(())
}

fn check_source(ports: &BTreeMap<String, NodePorts>, addr: &str, context: &str) -> Result<()> {
    let known = addr
        .split_once('.')
        .and_then(|(node, port)| ports.get(node).map(|n| n.outputs.contains(port)))
        .unwrap_or(false);
    if !known {
        return Err(SciPipeError::ConfigError(format!(
            "{context} refers to unknown out-port '{addr}' (expected 'node.port')"
        )));
    }
    Ok(())
}

fn validate_connections(cfg: &RawConfigFile, ports: &BTreeMap<String, NodePorts>) -> Result<()> {
    for (name, process) in &cfg.process {
        for (port, sources) in &process.inputs {
            for source in sources {
                check_source(ports, source, &format!("[process.{name}] in.{port}"))?;
            }
        }
    }
    for source in &cfg.workflow.sink {
        check_source(ports, source, "[workflow].sink")?;
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    node_order(node_names(cfg), &cfg.process).map(|_| ())
}

/// Node names ordered so that every node comes after the nodes it reads from.
pub(crate) fn node_order<'a>(
    nodes: impl Iterator<Item = &'a String>,
    processes: &'a BTreeMap<String, ProcessConfig>,
) -> Result<Vec<String>> {
    // Edge direction: upstream node -> consuming process.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in nodes {
        graph.add_node(name.as_str());
    }

    for (name, process) in processes {
        for source in process.inputs.values().flatten() {
            if let Some((node, _)) = source.split_once('.') {
                if graph.contains_node(node) {
                    graph.add_edge(node, name.as_str(), ());
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(SciPipeError::Cycle(format!(
            "connections loop back to node '{}'",
            cycle.node_id()
        ))),
    }
}
