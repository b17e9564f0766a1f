//! The vault core: value aggregation, range sizing, rebalancing, incremental
//! unwinding and proportional deposit/withdraw resizing.
//!
//! Every operation that touches a collaborator follows the same shape: checks
//! that need no external state run first, then a venue transaction is opened,
//! the new [`VaultState`] is built on a clone while the external calls are
//! made, and the clone replaces the live state only after the venue commits.
//! Any failure rolls the venue back and leaves the live state untouched.

pub mod access;
pub mod admin;
pub mod error;
pub mod rebalance;
pub mod resize;
pub mod sizing;
pub mod unwind;
pub mod valuation;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;

use crate::model::{VaultConfig, VaultState};
use crate::venues::{MarginVenue, PriceSource, YieldAdapter};

pub use access::Role;
pub use error::{ErrorKind, VaultError};
pub use rebalance::{RebalanceOutcome, RebalanceReport};
pub use resize::{DepositReceipt, WithdrawReceipt};
pub use sizing::compute_range;
pub use unwind::UnwindStep;

/// A delta-managed yield vault bound to its collaborators.
pub struct Vault {
    config: VaultConfig,
    state: VaultState,
    venue: Box<dyn MarginVenue>,
    prices: Box<dyn PriceSource>,
    yield_adapter: Box<dyn YieldAdapter>,
}

impl Vault {
    /// A freshly deployed vault.
    pub fn new(
        config: VaultConfig,
        venue: Box<dyn MarginVenue>,
        prices: Box<dyn PriceSource>,
        yield_adapter: Box<dyn YieldAdapter>,
    ) -> Result<Self, VaultError> {
        let state = VaultState::new(&config);
        Self::with_state(config, state, venue, prices, yield_adapter)
    }

    /// Resume a vault from persisted state.
    pub fn with_state(
        config: VaultConfig,
        state: VaultState,
        venue: Box<dyn MarginVenue>,
        prices: Box<dyn PriceSource>,
        yield_adapter: Box<dyn YieldAdapter>,
    ) -> Result<Self, VaultError> {
        crate::validate::validate(&config).map_err(VaultError::InvalidParams)?;
        if let Some(range) = state.range {
            if !range.is_well_formed(state.sizing.tick_spacing) {
                return Err(VaultError::InvalidRange {
                    tick_lower: range.tick_lower,
                    tick_upper: range.tick_upper,
                    spacing: state.sizing.tick_spacing,
                });
            }
        }
        tracing::info!(
            vault = %config.name,
            pool = %config.pool,
            account = %config.account,
            total_shares = state.total_shares,
            "vault ready"
        );
        Ok(Self {
            config,
            state,
            venue,
            prices,
            yield_adapter,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn is_reset(&self) -> bool {
        self.state.is_reset
    }

    pub fn total_shares(&self) -> u128 {
        self.state.total_shares
    }

    pub fn shares_of(&self, holder: &Address) -> u128 {
        self.state.shares_of(holder)
    }

    pub fn save_state(&self, path: &Path) -> anyhow::Result<()> {
        self.state.save(path)
    }

    fn require(&self, caller: Address, role: Role) -> Result<(), VaultError> {
        access::require(&self.state, caller, role)
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.call_timeout()
    }

    // ── Venue transactions ───────────────────────────────────────────

    async fn begin(&mut self) -> Result<(), VaultError> {
        let timeout = self.timeout();
        call(timeout, "begin", self.venue.begin()).await
    }

    /// Commit the venue transaction and adopt the staged state, or roll the
    /// venue back and keep the live state.
    async fn finish<T>(&mut self, op: &'static str, outcome: Result<(VaultState, T), VaultError>) -> Result<T, VaultError> {
        let timeout = self.timeout();
        let outcome = match outcome {
            Ok(staged) => call(timeout, "commit", self.venue.commit()).await.map(|()| staged),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((state, value)) => {
                self.state = state;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(op, error = %e, "aborted, rolling back");
                if let Err(rollback) = call(timeout, "rollback", self.venue.rollback()).await {
                    tracing::error!(op, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Await a collaborator call under the configured timeout.
pub(crate) async fn call<T>(
    timeout: Option<Duration>,
    op: &'static str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, VaultError> {
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| VaultError::Timeout {
            op,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })?,
        None => fut.await,
    };
    result.map_err(|source| VaultError::external(op, source))
}
