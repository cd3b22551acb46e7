// src/config/mod.rs

//! Declarative workflow files.
//!
//! - [`model`] mirrors the TOML layout (`RawConfigFile`) and holds the
//!   validated `ConfigFile`.
//! - [`validate`] implements `TryFrom<RawConfigFile> for ConfigFile`.
//! - [`loader`] reads files from disk.
//! - [`build`] turns a `ConfigFile` into a runnable workflow.

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{build_workflow, build_workflow_with};
pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile};
