use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::venues::YieldAdapter;

#[derive(Debug, Default)]
struct YieldBook {
    pending: u128,
    harvested: u128,
    fail_next: bool,
}

/// Yield adapter whose accrual is driven by the caller.
#[derive(Debug, Clone, Default)]
pub struct SimulatedYield {
    inner: Arc<Mutex<YieldBook>>,
}

impl SimulatedYield {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` asset units of unharvested yield.
    pub fn accrue(&self, amount: u128) {
        let mut book = self.inner.lock();
        book.pending = book.pending.saturating_add(amount);
    }

    pub fn pending(&self) -> u128 {
        self.inner.lock().pending
    }

    /// Total yield handed out by `harvest` so far.
    pub fn harvested(&self) -> u128 {
        self.inner.lock().harvested
    }

    pub fn fail_next_harvest(&self) {
        self.inner.lock().fail_next = true;
    }
}

#[async_trait]
impl YieldAdapter for SimulatedYield {
    async fn harvest(&mut self) -> Result<u128> {
        let mut book = self.inner.lock();
        if std::mem::take(&mut book.fail_next) {
            bail!("simulated harvest failure");
        }
        let amount = std::mem::take(&mut book.pending);
        book.harvested += amount;
        Ok(amount)
    }

    async fn pending_yield(&self) -> Result<u128> {
        Ok(self.inner.lock().pending)
    }
}
