// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scipipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scipipe",
    version,
    about = "Run a dataflow workflow of shell commands described in a TOML file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    ///
    /// Default: `Scipipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Scipipe.toml")]
    pub config: String,

    /// Only run the named process and everything upstream of it.
    ///
    /// May be given several times.
    #[arg(long = "to", value_name = "NAME")]
    pub to: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCIPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the workflow graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
