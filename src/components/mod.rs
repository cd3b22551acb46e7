// src/components/mod.rs

//! Ready-made processes for feeding and draining workflows.
//!
//! - [`params`] has [`ParamSource`], which emits parameter values.
//! - [`files`] has [`FileSource`] and [`FileGlobber`], which emit existing
//!   files as packets.
//! - [`gather`] has [`SubStreamGatherer`], which bundles a stream into one
//!   sub-stream packet.
//! - [`sink`] has [`Sink`], which drains out-ports and records what arrived.

pub mod files;
pub mod gather;
pub mod params;
pub mod sink;

pub use files::{FileGlobber, FileSource};
pub use gather::SubStreamGatherer;
pub use params::ParamSource;
pub use sink::Sink;
