// src/port/outport.rs

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use super::{lock, InPort, ParamOutPort, PortAddr};
use crate::errors::{Result, SciPipeError};
use crate::ip::Ip;

/// Sending endpoint of a process.
///
/// Cloning yields another handle to the same port.
pub struct OutPort<T = Ip> {
    inner: Arc<OutPortInner<T>>,
}

struct OutPortInner<T> {
    addr: PortAddr,
    state: Mutex<OutState<T>>,
}

struct OutState<T> {
    targets: Vec<(PortAddr, mpsc::Sender<T>)>,
    closed: bool,
}

impl<T> Clone for OutPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for OutPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        let targets: Vec<_> = state.targets.iter().map(|(a, _)| a.to_string()).collect();
        f.debug_struct("OutPort")
            .field("addr", &self.inner.addr)
            .field("targets", &targets)
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T: Clone + Send + 'static> OutPort<T> {
    pub fn new(process: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(OutPortInner {
                addr: PortAddr::new(process, name),
                state: Mutex::new(OutState {
                    targets: Vec::new(),
                    closed: false,
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

    /// Connect this out-port to an in-port.
    ///
    /// Several out-ports may connect to the same in-port (fan-in), and one
    /// out-port may connect to several in-ports (fan-out).
    pub fn connect(&self, to: &InPort<T>) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return Err(SciPipeError::ConfigError(format!(
                "cannot connect {} -> {}: out-port is closed",
                self.inner.addr,
                to.addr()
            )));
        }
        let tx = to.attach(self.inner.addr.clone())?;
        state.targets.push((to.addr().clone(), tx));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        !lock(&self.inner.state).targets.is_empty()
    }

    /// In-ports this out-port feeds.
    pub fn downstream(&self) -> Vec<PortAddr> {
        lock(&self.inner.state)
            .targets
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Drop every connection whose in-port belongs to a process for which
    /// `exclude` returns true. Returns the detached in-ports.
    pub fn detach_where(&self, exclude: impl Fn(&str) -> bool) -> Vec<PortAddr> {
        let mut state = lock(&self.inner.state);
        let mut detached = Vec::new();
        state.targets.retain(|(addr, _)| {
            if exclude(&addr.process) {
                detached.push(addr.clone());
                false
            } else {
                true
            }
        });
        for addr in &detached {
            debug!(from = %self.inner.addr, to = %addr, "detached connection");
        }
        detached
    }

    /// Send a packet to every connected in-port, waiting while a downstream
    /// channel is full.
    pub async fn send(&self, item: T) -> Result<()> {
        let targets: Vec<(PortAddr, mpsc::Sender<T>)> = {
            let state = lock(&self.inner.state);
            state
                .targets
                .iter()
                .map(|(addr, tx)| (addr.clone(), tx.clone()))
                .collect()
        };

        for (addr, tx) in targets {
            tx.send(item.clone())
                .await
                .map_err(|_| SciPipeError::ChannelClosed(format!("{} -> {addr}", self.inner.addr)))?;
        }
        Ok(())
    }

    /// Close the port. Only the first call has an effect.
    pub fn close(&self) {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return;
        }
        state.closed = true;
        state.targets.clear();
        debug!(port = %self.inner.addr, "closed out-port");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }
}

/// Closes a set of out-ports when dropped.
///
/// Held by process supervisors so that ports close on every exit path.
#[derive(Debug, Default)]
pub struct PortCloser {
    ports: Vec<OutPort>,
    param_ports: Vec<ParamOutPort>,
}

impl PortCloser {
    pub fn new(ports: Vec<OutPort>, param_ports: Vec<ParamOutPort>) -> Self {
        Self { ports, param_ports }
    }
}

impl Drop for PortCloser {
    fn drop(&mut self) {
        for port in &self.ports {
            port.close();
        }
        for port in &self.param_ports {
            port.close();
        }
    }
}
