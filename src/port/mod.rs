// src/port/mod.rs

//! Typed endpoints connecting processes.
//!
//! Every in-port owns one bounded tokio mpsc channel. Connecting an out-port
//! hands it a clone of the channel's sender, so an in-port fed by several
//! out-ports (fan-in) receives one merged stream that closes exactly when the
//! last contributing out-port has closed. An out-port connected to several
//! in-ports (fan-out) sends every packet to each of them.
//!
//! Parameter ports use the same machinery with `String` payloads.

pub mod buffer;
mod inport;
mod outport;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use inport::InPort;
pub use outport::{OutPort, PortCloser};

/// In-port carrying plain parameter strings.
pub type ParamInPort = InPort<String>;

/// Out-port carrying plain parameter strings.
pub type ParamOutPort = OutPort<String>;

/// Identifies a port by owning process and port name.
///
/// Ports refer to their process by name only; the workflow registry owns the
/// processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortAddr {
    pub process: String,
    pub port: String,
}

impl PortAddr {
    pub fn new(process: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.process, self.port)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
