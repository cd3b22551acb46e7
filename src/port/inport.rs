// src/port/inport.rs

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use super::{lock, PortAddr};
use crate::errors::{Result, SciPipeError};
use crate::ip::Ip;

/// Receiving endpoint of a process.
///
/// Cloning yields another handle to the same port.
pub struct InPort<T = Ip> {
    inner: Arc<InPortInner<T>>,
}

struct InPortInner<T> {
    addr: PortAddr,
    state: Mutex<InState<T>>,
}

struct InState<T> {
    /// Template sender cloned for each upstream; dropped when the port opens.
    tx: Option<mpsc::Sender<T>>,
    rx: Option<mpsc::Receiver<T>>,
    upstream: Vec<PortAddr>,
}

impl<T> Clone for InPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for InPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPort")
            .field("addr", &self.inner.addr)
            .field("upstream", &lock(&self.inner.state).upstream)
            .finish()
    }
}

impl<T: Send + 'static> InPort<T> {
    pub fn new(process: impl Into<String>, name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            inner: Arc::new(InPortInner {
                addr: PortAddr::new(process, name),
                state: Mutex::new(InState {
                    tx: Some(tx),
                    rx: Some(rx),
                    upstream: Vec::new(),
                }),
            }),
        }
    }

    pub fn addr(&self) -> &PortAddr {
        &self.inner.addr
    }

    pub fn name(&self) -> &str {
        &self.inner.addr.port
    }

    pub fn process(&self) -> &str {
        &self.inner.addr.process
    }

    pub fn is_connected(&self) -> bool {
        !lock(&self.inner.state).upstream.is_empty()
    }

    /// Out-ports feeding this port.
    pub fn upstream(&self) -> Vec<PortAddr> {
        lock(&self.inner.state).upstream.clone()
    }

    /// Record a new upstream and hand out a sender for it.
    pub(crate) fn attach(&self, from: PortAddr) -> Result<mpsc::Sender<T>> {
        let mut state = lock(&self.inner.state);
        let tx = state.tx.clone().ok_or_else(|| {
            SciPipeError::ConfigError(format!(
                "cannot connect {from} -> {}: in-port is already running",
                self.inner.addr
            ))
        })?;
        debug!(from = %from, to = %self.inner.addr, "connected ports");
        state.upstream.push(from);
        Ok(tx)
    }

    /// Take the receiving side for the process run.
    ///
    /// Drops the port's own sender, so the returned receiver yields `None`
    /// once every connected out-port has closed.
    pub fn open(&self) -> Result<mpsc::Receiver<T>> {
        let mut state = lock(&self.inner.state);
        state.tx = None;
        state.rx.take().ok_or_else(|| {
            SciPipeError::ConfigError(format!("in-port {} was already opened", self.inner.addr))
        })
    }
}
