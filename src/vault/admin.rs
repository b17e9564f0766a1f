use alloy::primitives::Address;

use super::{Role, Vault, VaultError, call};
use crate::model::{CloseParams, RebalanceParams, SizingParams};
use crate::validate;

impl Vault {
    pub fn set_keeper(&mut self, caller: Address, keeper: Address) -> Result<(), VaultError> {
        self.require(caller, Role::Owner)?;
        if keeper.is_zero() {
            return Err(VaultError::InvalidParams(vec![validate::ConfigError::ZeroAddress { role: "keeper" }]));
        }
        tracing::info!(old = %self.state.keeper, new = %keeper, "keeper changed");
        self.state.keeper = keeper;
        Ok(())
    }

    pub fn set_deposit_cap(&mut self, caller: Address, cap: u128) -> Result<(), VaultError> {
        self.require(caller, Role::Owner)?;
        tracing::info!(old = self.state.deposit_cap, new = cap, "deposit cap changed");
        self.state.deposit_cap = cap;
        Ok(())
    }

    /// Replace the rebalance thresholds. The last rebalance timestamp is kept.
    pub fn set_rebalance_params(&mut self, caller: Address, params: RebalanceParams) -> Result<(), VaultError> {
        self.require(caller, Role::Owner)?;
        let errors = validate::check_rebalance(&params);
        if !errors.is_empty() {
            return Err(VaultError::InvalidParams(errors));
        }
        self.state.rebalance = RebalanceParams {
            last_rebalance_timestamp: self.state.rebalance.last_rebalance_timestamp,
            ..params
        };
        tracing::info!(params = ?self.state.rebalance, "rebalance params changed");
        Ok(())
    }

    pub fn set_close_params(&mut self, caller: Address, params: CloseParams) -> Result<(), VaultError> {
        self.require(caller, Role::Owner)?;
        let errors = validate::check_close(&params);
        if !errors.is_empty() {
            return Err(VaultError::InvalidParams(errors));
        }
        tracing::info!(params = ?params, "close params changed");
        self.state.close = params;
        Ok(())
    }

    /// Replace the sizing parameters. A spacing change must keep the open
    /// range aligned.
    pub fn set_sizing_params(&mut self, caller: Address, params: SizingParams) -> Result<(), VaultError> {
        self.require(caller, Role::Owner)?;
        let errors = validate::check_sizing(&params);
        if !errors.is_empty() {
            return Err(VaultError::InvalidParams(errors));
        }
        if let Some(range) = self.state.range {
            if !range.is_well_formed(params.tick_spacing) {
                return Err(VaultError::InvalidRange {
                    tick_lower: range.tick_lower,
                    tick_upper: range.tick_upper,
                    spacing: params.tick_spacing,
                });
            }
        }
        tracing::info!(params = ?params, "sizing params changed");
        self.state.sizing = params;
        Ok(())
    }

    /// Realise accrued yield into the idle balance. Keeper only.
    pub async fn harvest(&mut self, caller: Address) -> Result<u128, VaultError> {
        self.require(caller, Role::Keeper)?;
        self.realise_yield().await
    }

    /// Harvest only if the adapter reports pending yield.
    pub(crate) async fn harvest_pending(&mut self) -> Result<u128, VaultError> {
        let pending = call(self.timeout(), "pending_yield", self.yield_adapter.pending_yield()).await?;
        if pending == 0 {
            return Ok(0);
        }
        self.realise_yield().await
    }

    async fn realise_yield(&mut self) -> Result<u128, VaultError> {
        let harvested = call(self.timeout(), "harvest", self.yield_adapter.harvest()).await?;
        self.state.idle_balance = self
            .state
            .idle_balance
            .checked_add(harvested)
            .ok_or(VaultError::InvalidAmount("harvest overflows idle balance"))?;
        tracing::info!(harvested, idle = self.state.idle_balance, "harvested yield");
        Ok(harvested)
    }
}
