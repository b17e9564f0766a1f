use alloy::primitives::Address;

use super::sizing::compute_range;
use super::unwind::{sqrt_price_limit, unbounded_limit};
use super::{Vault, VaultError, call};
use crate::math::full_math::{mul_div_u128, mul_div_up_u128};
use crate::model::{ValueSnapshot, VaultState};
use crate::venues::RangeId;

const BPS: u128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub assets: u128,
    pub shares: u128,
    /// Part of the deposit posted as margin collateral.
    pub collateral_posted: u128,
    /// Liquidity added to the hedge range.
    pub liquidity_added: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub shares: u128,
    /// Gross assets the burned shares were worth.
    pub assets: u128,
    /// Exit fee retained by the vault.
    pub fee: u128,
    /// Assets handed to the holder, after position settlement costs.
    pub paid: u128,
    /// Part of `paid` realised from the margin position.
    pub position_settled: u128,
    pub liquidity_removed: u128,
}

/// Shares minted for `assets` against `total_assets` / `total_shares`, rounded down.
/// With no shares outstanding the deposit mints 1:1; any residual assets are
/// swept to the owner at the same rate when the deposit is staged.
pub fn shares_for_deposit(assets: u128, total_assets: u128, total_shares: u128) -> Result<u128, VaultError> {
    if total_assets == 0 || total_shares == 0 {
        return Ok(assets);
    }
    Ok(mul_div_u128(assets, total_shares, total_assets)?)
}

/// Assets owed for `shares`, rounded down.
pub fn assets_for_shares(shares: u128, total_assets: u128, total_shares: u128) -> Result<u128, VaultError> {
    if total_shares == 0 {
        return Ok(0);
    }
    Ok(mul_div_u128(shares, total_assets, total_shares)?)
}

/// Shares to burn for `assets`, rounded up.
pub fn shares_for_withdrawal(assets: u128, total_assets: u128, total_shares: u128) -> Result<u128, VaultError> {
    if total_assets == 0 {
        return Err(VaultError::InsufficientLiquidity { available: 0, requested: assets });
    }
    Ok(mul_div_up_u128(assets, total_shares, total_assets)?)
}

impl Vault {
    pub async fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        let snapshot = self.snapshot().await?;
        shares_for_deposit(assets, snapshot.total_assets, self.state.total_shares)
    }

    pub async fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        let snapshot = self.snapshot().await?;
        assets_for_shares(shares, snapshot.total_assets, self.state.total_shares)
    }

    pub async fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        self.convert_to_shares(assets).await
    }

    /// Assets paid out for redeeming `shares`, net of the exit fee. Any part
    /// of the claim held in the margin position is paid after the cost of
    /// trading it out, so the actual payout can be slightly lower.
    pub async fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        let gross = self.convert_to_assets(shares).await?;
        Ok(gross - self.exit_fee(gross)?)
    }

    /// Shares burned to withdraw `assets`.
    pub async fn preview_withdraw(&self, assets: u128) -> Result<u128, VaultError> {
        let snapshot = self.snapshot().await?;
        shares_for_withdrawal(assets, snapshot.total_assets, self.state.total_shares)
    }

    /// Asset units `holder`'s shares are currently worth.
    pub async fn max_withdraw(&self, holder: &Address) -> Result<u128, VaultError> {
        self.convert_to_assets(self.state.shares_of(holder)).await
    }

    fn exit_fee(&self, assets: u128) -> Result<u128, VaultError> {
        Ok(mul_div_up_u128(assets, u128::from(self.config.withdraw_fee_bps), BPS)?)
    }

    // ── Deposit ──────────────────────────────────────────────────────

    /// Accept `assets`, mint shares and grow the hedge range in proportion.
    pub async fn deposit(&mut self, caller: Address, assets: u128) -> Result<DepositReceipt, VaultError> {
        if assets == 0 {
            return Err(VaultError::InvalidAmount("deposit of zero assets"));
        }
        let before = self.snapshot().await?;
        let total_after = before
            .total_assets
            .checked_add(assets)
            .ok_or(VaultError::InvalidAmount("deposit overflows total assets"))?;
        if total_after > self.state.deposit_cap {
            tracing::warn!(assets, total_after, cap = self.state.deposit_cap, "deposit over cap");
            return Err(VaultError::DepositCapExceeded { amount: assets, total_after, cap: self.state.deposit_cap });
        }
        let shares = shares_for_deposit(assets, before.total_assets, self.state.total_shares)?;
        if shares == 0 {
            return Err(VaultError::InvalidAmount("deposit too small to mint a share"));
        }

        self.begin().await?;
        let staged = self.stage_deposit(caller, assets, shares, &before).await;
        let receipt = self.finish("deposit", staged).await?;
        tracing::info!(
            %caller,
            assets,
            shares,
            collateral = receipt.collateral_posted,
            liquidity = receipt.liquidity_added,
            "deposit"
        );
        Ok(receipt)
    }

    async fn stage_deposit(
        &mut self,
        caller: Address,
        assets: u128,
        shares: u128,
        before: &ValueSnapshot,
    ) -> Result<(VaultState, DepositReceipt), VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);
        let mut staged = self.state.clone();

        let collateral_posted = mul_div_u128(assets, u128::from(self.config.collateral_share_bps), BPS)?;
        if collateral_posted > 0 {
            call(timeout, "deposit_collateral", self.venue.deposit_collateral(account, collateral_posted)).await?;
        }
        staged.idle_balance += assets - collateral_posted;

        let total_before = before.total_assets;
        let target = match staged.range {
            Some(range) if range.liquidity > 0 => {
                if total_before > 0 {
                    let added = mul_div_u128(range.liquidity, assets, total_before)?;
                    Some(range.with_liquidity(range.liquidity + added))
                } else {
                    None
                }
            }
            _ if total_before == 0 => {
                let tick = call(timeout, "current_tick", self.prices.current_tick(pool)).await?;
                let value = before.yield_asset_price.value_of(assets)?;
                Some(compute_range(value, tick, &staged.sizing)?)
            }
            // Value without a range waits for the next rebalance to size one.
            _ => None,
        };

        let mut liquidity_added = 0;
        if let Some(target) = target {
            liquidity_added = target.liquidity - staged.liquidity();
            if liquidity_added > 0 {
                let delta =
                    i128::try_from(liquidity_added).map_err(|_| VaultError::InvalidAmount("liquidity exceeds i128"))?;
                call(
                    timeout,
                    "open_range",
                    self.venue.open_range(account, pool, target.tick_lower, target.tick_upper, delta),
                )
                .await?;
                staged.range = Some(target);
            }
        }

        // Assets left with no shares outstanding go to the owner at 1:1.
        if staged.total_shares == 0 && total_before > 0 {
            let owner = staged.owner;
            staged.total_shares = total_before;
            *staged.holders.entry(owner).or_default() += total_before;
            tracing::info!(%owner, residual = total_before, "swept unowned assets to owner");
        }
        staged.total_shares += shares;
        *staged.holders.entry(caller).or_default() += shares;

        Ok((
            staged,
            DepositReceipt {
                assets,
                shares,
                collateral_posted,
                liquidity_added,
            },
        ))
    }

    // ── Withdraw ─────────────────────────────────────────────────────

    /// Burn `shares` and pay out their pro-rata value, shrinking the range in
    /// proportion.
    pub async fn redeem(&mut self, caller: Address, shares: u128) -> Result<WithdrawReceipt, VaultError> {
        if shares == 0 {
            return Err(VaultError::InvalidAmount("redeem of zero shares"));
        }
        self.check_shares(caller, shares)?;
        self.harvest_pending().await?;
        let before = self.snapshot().await?;
        let assets = assets_for_shares(shares, before.total_assets, self.state.total_shares)?;
        self.exit(caller, shares, assets, &before).await
    }

    /// Withdraw exactly `assets` (before fees), burning the shares they are worth.
    pub async fn withdraw(&mut self, caller: Address, assets: u128) -> Result<WithdrawReceipt, VaultError> {
        if assets == 0 {
            return Err(VaultError::InvalidAmount("withdrawal of zero assets"));
        }
        let before = self.snapshot().await?;
        let shares = shares_for_withdrawal(assets, before.total_assets, self.state.total_shares)?;
        self.check_shares(caller, shares)?;
        let before = if before.accrued_yield > 0 {
            self.harvest_pending().await?;
            self.snapshot().await?
        } else {
            before
        };
        self.exit(caller, shares, assets, &before).await
    }

    fn check_shares(&self, holder: Address, requested: u128) -> Result<(), VaultError> {
        let available = self.state.shares_of(&holder);
        if requested > available {
            return Err(VaultError::InsufficientShares { holder, available, requested });
        }
        Ok(())
    }

    async fn exit(
        &mut self,
        caller: Address,
        shares: u128,
        assets: u128,
        before: &ValueSnapshot,
    ) -> Result<WithdrawReceipt, VaultError> {
        let fee = self.exit_fee(assets)?;
        let owed = assets - fee;

        self.begin().await?;
        let staged = self.stage_exit(caller, shares, assets, owed, before).await;
        let mut receipt = self.finish("withdraw", staged).await?;
        receipt.fee = fee;
        tracing::info!(
            %caller,
            shares,
            assets,
            fee,
            paid = receipt.paid,
            position_settled = receipt.position_settled,
            liquidity = receipt.liquidity_removed,
            "withdraw"
        );
        Ok(receipt)
    }

    async fn stage_exit(
        &mut self,
        caller: Address,
        shares: u128,
        assets: u128,
        owed: u128,
        before: &ValueSnapshot,
    ) -> Result<(VaultState, WithdrawReceipt), VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);
        let mut staged = self.state.clone();

        // The liquid part of the claim is paid in the vault's liquid ratio;
        // the rest is the holder's share of the margin position.
        let liquid = before.withdrawable();
        let from_liquid = if before.total_assets == 0 {
            0
        } else {
            mul_div_u128(owed, liquid, before.total_assets)?.min(owed).min(liquid)
        };
        let position_claim = owed - from_liquid;
        let net = if position_claim > 0 {
            call(timeout, "net_token_position", self.venue.net_token_position(account, pool)).await?
        } else {
            0
        };

        let mut liquidity_removed = 0;
        if let Some(range) = staged.range.filter(|r| r.liquidity > 0) {
            liquidity_removed = if before.total_assets > 0 {
                mul_div_up_u128(range.liquidity, assets, before.total_assets)?
            } else {
                mul_div_up_u128(range.liquidity, shares, staged.total_shares)?
            }
            .min(range.liquidity);
            if liquidity_removed == range.liquidity {
                let id = RangeId { tick_lower: range.tick_lower, tick_upper: range.tick_upper };
                call(timeout, "close_range", self.venue.close_range(account, pool, id)).await?;
                staged.range = None;
            } else if liquidity_removed > 0 {
                let delta =
                    i128::try_from(liquidity_removed).map_err(|_| VaultError::InvalidAmount("liquidity exceeds i128"))?;
                call(
                    timeout,
                    "open_range",
                    self.venue.open_range(account, pool, range.tick_lower, range.tick_upper, -delta),
                )
                .await?;
                staged.range = Some(range.with_liquidity(range.liquidity - liquidity_removed));
            }
        }

        let position_settled = if position_claim > 0 {
            self.settle_position(net, owed, position_claim, before, &staged).await?
        } else {
            0
        };

        // Pay the liquid part pro-rata from collateral and idle balance.
        let from_collateral = if from_liquid > 0 {
            mul_div_u128(from_liquid, before.margin_collateral, liquid)?
        } else {
            0
        };
        let from_idle = from_liquid - from_collateral;
        let (from_idle, from_collateral) = if from_idle > staged.idle_balance {
            (staged.idle_balance, from_liquid - staged.idle_balance)
        } else {
            (from_idle, from_collateral)
        };
        let collateral_out = from_collateral + position_settled;
        if collateral_out > 0 {
            call(timeout, "withdraw_collateral", self.venue.withdraw_collateral(account, collateral_out)).await?;
        }
        staged.idle_balance -= from_idle;

        staged.total_shares -= shares;
        let remaining = staged.shares_of(&caller) - shares;
        if remaining == 0 {
            staged.holders.remove(&caller);
        } else {
            staged.holders.insert(caller, remaining);
        }

        Ok((
            staged,
            WithdrawReceipt {
                shares,
                assets,
                fee: 0,
                paid: from_liquid + position_settled,
                position_settled,
                liquidity_removed,
            },
        ))
    }

    /// Realise `claim` asset units of margin position value for an exiting
    /// holder. Their pro-rata share of the net token position is traded away,
    /// then the freed settlement balance is moved into collateral. Trading
    /// costs come out of the claim. Returns the asset units credited.
    async fn settle_position(
        &mut self,
        net: i128,
        owed: u128,
        claim: u128,
        before: &ValueSnapshot,
        staged: &VaultState,
    ) -> Result<u128, VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);
        let base_price = self.index_price(&self.config.base_asset).await?;

        let share = mul_div_u128(net.unsigned_abs(), owed, before.total_assets)?;
        let size = i128::try_from(share).map_err(|_| VaultError::InvalidAmount("position share exceeds i128"))?;
        let trade = if net < 0 { size } else { -size };
        let mut cost = 0i128;
        if trade != 0 {
            let tolerance_bps = staged.close.close_position_slippage_sqrt_tolerance_bps;
            let limit = if base_price.value_of(share)? < staged.close.min_notional_position_to_close_threshold {
                unbounded_limit(trade)
            } else {
                let sqrt_price = call(timeout, "sqrt_price_x96", self.prices.sqrt_price_x96(pool)).await?;
                sqrt_price_limit(sqrt_price, trade, tolerance_bps)?
            };
            let quote = call(timeout, "quote_swap", self.venue.quote_swap(pool, trade, limit)).await?;
            if quote.filled() < share {
                return Err(VaultError::SlippageExceeded { net_position: -trade, tolerance_bps });
            }
            let result = call(timeout, "swap", self.venue.swap(account, pool, trade, limit, false)).await?;
            // Shortfall against the index price; negative when the pool paid better.
            cost = -(base_price.signed_value_of(result.token_delta)? + result.quote_delta);
        }

        let claim_value = i128::try_from(before.yield_asset_price.value_of(claim)?)
            .map_err(|_| VaultError::InvalidAmount("claim exceeds i128"))?;
        let realised = claim_value.saturating_sub(cost).max(0).unsigned_abs();
        if realised == 0 {
            return Ok(0);
        }
        let credited = call(
            timeout,
            "settle_to_collateral",
            self.venue.settle_to_collateral(account, pool, realised, before.yield_asset_price),
        )
        .await?;
        tracing::debug!(claim, traded = trade, cost, credited, "settled position share");
        Ok(credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_deposit_mints_one_to_one() {
        assert_eq!(shares_for_deposit(40, 0, 0).unwrap(), 40);
        assert_eq!(shares_for_deposit(40, 7, 0).unwrap(), 40);
    }

    #[test]
    fn later_deposits_mint_pro_rata_rounding_down() {
        assert_eq!(shares_for_deposit(10, 40, 40).unwrap(), 10);
        assert_eq!(shares_for_deposit(10, 30, 20).unwrap(), 6);
    }

    #[test]
    fn withdrawal_rounds_in_the_vaults_favour() {
        assert_eq!(assets_for_shares(1, 3, 2).unwrap(), 1);
        assert_eq!(shares_for_withdrawal(1, 3, 2).unwrap(), 1);
        assert_eq!(shares_for_withdrawal(2, 3, 2).unwrap(), 2);
        assert!(shares_for_withdrawal(1, 0, 0).is_err());
    }
}
