// src/config/build.rs

//! Turning a validated workflow file into a runnable [`Workflow`].

use std::sync::Arc;

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::node_order;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::workflow::{Workflow, SINK_NAME};

/// Build a workflow that runs commands with the default shell backend.
pub fn build_workflow(cfg: &ConfigFile) -> Result<Workflow> {
    let workflow = Workflow::new(&cfg.workflow.name, cfg.workflow.max_concurrent_tasks)?
        .with_exec_mode(cfg.workflow.exec_mode);
    populate(cfg, workflow)
}

/// Build a workflow with an explicit backend and port capacity.
pub fn build_workflow_with(
    cfg: &ConfigFile,
    backend: Arc<dyn ExecutorBackend>,
    capacity: usize,
) -> Result<Workflow> {
    let workflow =
        Workflow::with_capacity(&cfg.workflow.name, cfg.workflow.max_concurrent_tasks, capacity)
            .with_backend(backend)
            .with_exec_mode(cfg.workflow.exec_mode);
    populate(cfg, workflow)
}

fn populate(cfg: &ConfigFile, mut workflow: Workflow) -> Result<Workflow> {
    let nodes = cfg.params.keys().chain(cfg.files.keys()).chain(cfg.process.keys());

    // Upstream nodes first, so the last registered process is a leaf.
    for name in node_order(nodes, &cfg.process)? {
        if let Some(params) = cfg.params.get(&name) {
            if params.combine {
                workflow.new_param_cross_product(&name, params.values.clone())?;
            } else {
                workflow.new_param_source(&name, params.values.clone())?;
            }
        } else if let Some(files) = cfg.files.get(&name) {
            match &files.glob {
                Some(glob) => {
                    let root = files.root.clone().unwrap_or_else(|| ".".to_string());
                    workflow.new_file_globber(&name, root, glob)?;
                }
                None => {
                    workflow.new_file_source(&name, files.paths.clone())?;
                }
            }
        } else if let Some(pc) = cfg.process.get(&name) {
            let process = workflow.new_proc_with_params(&name, &pc.cmd, &pc.params)?;
            for (port, pattern) in &pc.out {
                process.set_out_path(port, pattern)?;
            }
            for port in &pc.stream {
                process.set_stream(port, true)?;
            }
            if let Some(prepend) = &pc.prepend {
                process.set_prepend(prepend.clone());
            }
            process.set_cores(pc.cores);
        }
        debug!(node = %name, "built node");
    }

    for (name, pc) in &cfg.process {
        for (port, sources) in &pc.inputs {
            for source in sources {
                workflow.connect(source, &format!("{name}.{port}"))?;
            }
        }
    }
    for source in &cfg.workflow.sink {
        workflow.connect(source, SINK_NAME)?;
    }
    if let Some(driver) = &cfg.workflow.driver {
        workflow.set_driver(driver)?;
    }

    Ok(workflow)
}
