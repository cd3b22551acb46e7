// src/lib.rs

pub mod cli;
pub mod components;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod ip;
pub mod logging;
pub mod port;
pub mod process;
pub mod task;
pub mod template;
pub mod types;
pub mod workflow;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::{build_workflow, load_and_validate};
use crate::errors::Result;

pub use crate::errors::SciPipeError;
pub use crate::ip::{AuditInfo, FileIp, Ip};
pub use crate::process::{Process, WorkflowProcess};
pub use crate::task::Task;
pub use crate::workflow::Workflow;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the workflow file, builds the workflow and either
/// prints it (`--dry-run`) or runs it, completely or up to the `--to`
/// processes.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let workflow = build_workflow(&cfg)?;

    if args.dry_run {
        print_dry_run(&workflow);
        return Ok(());
    }

    info!(config = %args.config, workflow = %workflow.name(), "loaded workflow");

    if args.to.is_empty() {
        workflow.run().await
    } else {
        let targets: Vec<&str> = args.to.iter().map(String::as_str).collect();
        workflow.run_to_processes(&targets).await
    }
}

/// Print processes, their ports and the process graph.
fn print_dry_run(workflow: &Workflow) {
    println!("scipipe dry-run");
    println!("  workflow = {}", workflow.name());
    println!("  max_concurrent_tasks = {}", workflow.max_concurrent_tasks());
    println!("  port capacity = {}", workflow.capacity());
    println!();

    println!("processes ({}):", workflow.processes().len());
    for process in workflow.processes() {
        println!("  - {}", process.name());
        for port in process.in_ports() {
            println!("      in  {:<12} <- {}", port.name(), join(port.upstream()));
        }
        for port in process.param_in_ports() {
            println!("      par {:<12} <- {}", port.name(), join(port.upstream()));
        }
        for port in process.out_ports() {
            println!("      out {:<12} -> {}", port.name(), join(port.downstream()));
        }
        for port in process.param_out_ports() {
            println!("      par {:<12} -> {}", port.name(), join(port.downstream()));
        }
    }
    println!();

    println!("graph:");
    println!("{}", workflow.to_dot());
}

fn join(addrs: Vec<crate::port::PortAddr>) -> String {
    if addrs.is_empty() {
        return "(unconnected)".to_string();
    }
    addrs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
