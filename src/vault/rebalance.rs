use alloy::primitives::Address;

use super::sizing::{compute_range, price_deviation_bps};
use super::{Role, Vault, VaultError, call};
use crate::math::full_math::mul_div_u128;
use crate::math::tick_math::sqrt_ratio_at_tick;
use crate::model::{HedgeRange, VaultState};
use crate::venues::RangeId;

/// What a completed recentre did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceReport {
    pub previous: Option<HedgeRange>,
    pub current: Option<HedgeRange>,
    /// Market value before the old range was closed.
    pub value_before: u128,
    /// Market value after the old range was closed, used for sizing.
    pub value_after_close: u128,
    /// Net token position after the old range was closed, before the new
    /// one is opened. Decides the reset.
    pub net_position: i128,
    /// Whether the net exposure tripped the reset threshold.
    pub reset_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceOutcome {
    /// Neither the time nor the price trigger is due; nothing changed.
    NotDue,
    Rebalanced(RebalanceReport),
}

impl Vault {
    /// Whether either rebalance trigger is due at `now`.
    pub async fn should_rebalance(&self, now: u64) -> Result<bool, VaultError> {
        let params = &self.state.rebalance;
        if now.saturating_sub(params.last_rebalance_timestamp) >= params.rebalance_time_threshold_secs {
            return Ok(true);
        }
        let Some(range) = self.state.range.filter(|r| r.liquidity > 0) else {
            return Ok(false);
        };
        let tick = call(self.timeout(), "current_tick", self.prices.current_tick(self.config.pool)).await?;
        let deviation = price_deviation_bps(sqrt_ratio_at_tick(tick)?, sqrt_ratio_at_tick(range.centre_tick())?)?;
        Ok(deviation >= u128::from(params.rebalance_price_threshold_bps))
    }

    /// Recentre the hedge range around the current price.
    ///
    /// Keeper only. Refused while a reset is pending.
    pub async fn rebalance(&mut self, caller: Address, now: u64) -> Result<RebalanceOutcome, VaultError> {
        self.require(caller, Role::Keeper)?;
        if self.state.is_reset {
            tracing::warn!("rebalance refused: reset pending");
            return Err(VaultError::ResetPending);
        }
        if !self.should_rebalance(now).await? {
            tracing::debug!(now, "rebalance not due");
            return Ok(RebalanceOutcome::NotDue);
        }

        self.begin().await?;
        let staged = self.stage_rebalance(now).await;
        let report = self.finish("rebalance", staged).await?;
        tracing::info!(
            previous = ?report.previous,
            current = ?report.current,
            value = report.value_after_close,
            net_position = report.net_position,
            reset = report.reset_triggered,
            "rebalanced"
        );
        Ok(RebalanceOutcome::Rebalanced(report))
    }

    async fn stage_rebalance(&mut self, now: u64) -> Result<(VaultState, RebalanceReport), VaultError> {
        let timeout = self.timeout();
        let (account, pool) = (self.config.account, self.config.pool);
        let mut staged = self.state.clone();

        let before = self.snapshot_of(&staged).await?;

        let previous = staged.range.take();
        if let Some(range) = previous {
            let id = RangeId { tick_lower: range.tick_lower, tick_upper: range.tick_upper };
            call(timeout, "close_range", self.venue.close_range(account, pool, id)).await?;
        }
        let after_close = self.snapshot_of(&staged).await?;

        let tick = call(timeout, "current_tick", self.prices.current_tick(pool)).await?;
        let target = compute_range(after_close.market_value, tick, &staged.sizing)?;
        let liquidity = match previous {
            Some(range) if range.liquidity > 0 && !staged.rebalance.resize_liquidity_on_rebalance => range.liquidity,
            _ => target.liquidity,
        };

        // Exposure left over from the closed range decides the reset; the new
        // range is delta-neutral at the moment it is minted.
        let net_position = call(timeout, "net_token_position", self.venue.net_token_position(account, pool)).await?;
        let base_price = self.index_price(&self.config.base_asset).await?;
        let exposure = base_price.value_of(net_position.unsigned_abs())?;
        let threshold = mul_div_u128(
            after_close.market_value,
            u128::from(staged.close.reset_position_threshold_bps),
            10_000,
        )?;
        let reset_triggered = exposure > threshold;

        if liquidity > 0 {
            let delta = i128::try_from(liquidity).map_err(|_| VaultError::InvalidAmount("liquidity exceeds i128"))?;
            call(
                timeout,
                "open_range",
                self.venue.open_range(account, pool, target.tick_lower, target.tick_upper, delta),
            )
            .await?;
            staged.range = Some(target.with_liquidity(liquidity));
        }
        staged.rebalance.last_rebalance_timestamp = now;
        if reset_triggered {
            tracing::warn!(net_position, exposure, threshold, "net exposure above reset threshold");
            staged.is_reset = true;
        }

        let report = RebalanceReport {
            previous,
            current: staged.range,
            value_before: before.market_value,
            value_after_close: after_close.market_value,
            net_position,
            reset_triggered,
        };
        Ok((staged, report))
    }
}
