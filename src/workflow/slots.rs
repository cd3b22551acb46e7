// src/workflow/slots.rs

//! Global admission control for tasks.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{Result, SciPipeError};

/// Counting semaphore shared by every process of a workflow.
///
/// A task holds `cores` permits for as long as it runs; permits are released
/// when the returned guard is dropped.
#[derive(Debug, Clone)]
pub struct SlotPool {
    sem: Arc<Semaphore>,
    max: usize,
}

impl SlotPool {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            sem: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Fail if a process asks for more slots per task than exist.
    pub fn check(&self, process: &str, cores: usize) -> Result<()> {
        if cores > self.max {
            return Err(SciPipeError::TooManyCores {
                process: process.to_string(),
                requested: cores,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Wait until `cores` slots are free and take them.
    pub async fn acquire(&self, cores: usize) -> Result<OwnedSemaphorePermit> {
        let n = u32::try_from(cores.clamp(1, self.max))
            .map_err(|_| anyhow!("cannot acquire {cores} slots"))?;
        let permit = Arc::clone(&self.sem)
            .acquire_many_owned(n)
            .await
            .map_err(|e| anyhow!("slot pool closed: {e}"))?;
        Ok(permit)
    }
}
