use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::math::full_math::{mul_div_u128, mul_div_up_u128, to_u128};
use crate::math::liquidity::{
    TokenAmounts, amount0_delta, amount1_delta, amounts_for_liquidity, next_sqrt_price_from_amount0_in,
    next_sqrt_price_from_amount0_out,
};
use crate::math::tick_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO, sqrt_ratio_at_tick, tick_at_sqrt_ratio};
use crate::math::PriceX128;
use crate::model::{AccountId, AssetId, PoolId};
use crate::venues::{MarginVenue, PriceSource, RangeChange, RangeId, SwapResult};

const PIPS: u128 = 1_000_000;

/// Collaborator calls that can be made to fail once via [`SimulatedMarket::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueOp {
    CollateralBalance,
    DepositCollateral,
    WithdrawCollateral,
    NetTokenPosition,
    NetPositionValue,
    OpenRange,
    CloseRange,
    SettleToCollateral,
    QuoteSwap,
    Swap,
    Begin,
    Commit,
    CurrentTick,
    SqrtPrice,
    IndexPrice,
}

// ── Book ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct RangeRecord {
    liquidity: u128,
    /// Tokens borrowed from the account to mint the liquidity.
    debt: TokenAmounts,
}

#[derive(Debug, Clone, Default)]
struct MarginAccount {
    collateral: u128,
    token_balance: i128,
    quote_balance: i128,
    ranges: BTreeMap<RangeId, RangeRecord>,
}

/// The part of the market a transaction can roll back.
#[derive(Debug, Clone)]
struct Book {
    sqrt_price_x96: U256,
    accounts: HashMap<AccountId, MarginAccount>,
    swaps: u64,
}

struct Inner {
    pool: PoolId,
    /// Constant in-range liquidity of the rest of the pool, used for swaps.
    pool_liquidity: u128,
    fee_pips: u32,
    book: Book,
    checkpoint: Option<Book>,
    index_prices: HashMap<AssetId, PriceX128>,
    failures: HashSet<VenueOp>,
    latency: Option<Duration>,
}

fn signed(x: u128) -> Result<i128> {
    i128::try_from(x).context("amount exceeds i128")
}

impl Inner {
    fn check_pool(&self, pool: PoolId) -> Result<()> {
        if pool != self.pool {
            bail!("unknown pool {pool}");
        }
        Ok(())
    }

    fn account(&self, account: AccountId) -> Option<&MarginAccount> {
        self.book.accounts.get(&account)
    }

    fn net_token_position(&self, account: AccountId) -> Result<i128> {
        let Some(acct) = self.account(account) else {
            return Ok(0);
        };
        let mut net = acct.token_balance;
        for (id, record) in &acct.ranges {
            let held = amounts_in(self.book.sqrt_price_x96, id, record.liquidity)?;
            net = net
                .checked_add(signed(held.amount0)? - signed(record.debt.amount0)?)
                .context("net token position overflow")?;
        }
        Ok(net)
    }

    fn net_position_value(&self, account: AccountId, index_price: PriceX128) -> Result<i128> {
        let Some(acct) = self.account(account) else {
            return Ok(0);
        };
        let mut value = index_price
            .signed_value_of(acct.token_balance)?
            .checked_add(acct.quote_balance)
            .context("position value overflow")?;
        for record in acct.ranges.values() {
            let debt_value = index_price
                .value_of(record.debt.amount0)?
                .checked_add(record.debt.amount1)
                .context("range debt overflow")?;
            value = value.checked_sub(signed(debt_value)?).context("position value overflow")?;
        }
        Ok(value)
    }

    fn modify_range(&mut self, account: AccountId, id: RangeId, liquidity_delta: i128) -> Result<RangeChange> {
        if id.tick_lower >= id.tick_upper {
            bail!("range lower tick {} not below upper tick {}", id.tick_lower, id.tick_upper);
        }
        let sqrt_price = self.book.sqrt_price_x96;
        let acct = self.book.accounts.entry(account).or_default();

        if liquidity_delta > 0 {
            let record = acct.ranges.entry(id).or_default();
            let new_liquidity = record
                .liquidity
                .checked_add(liquidity_delta.unsigned_abs())
                .context("range liquidity overflow")?;
            let before = amounts_in(sqrt_price, &id, record.liquidity)?;
            let after = amounts_in(sqrt_price, &id, new_liquidity)?;
            // Debt tracks the marginal mint cost so adds at one price sum exactly.
            let minted = TokenAmounts {
                amount0: after.amount0 - before.amount0,
                amount1: after.amount1 - before.amount1,
            };
            record.liquidity = new_liquidity;
            record.debt.amount0 += minted.amount0;
            record.debt.amount1 += minted.amount1;
            Ok(RangeChange { liquidity_delta, tokens: minted })
        } else if liquidity_delta < 0 {
            let remove = liquidity_delta.unsigned_abs();
            let Some(record) = acct.ranges.get_mut(&id) else {
                bail!("no range [{}, {}) in {account}", id.tick_lower, id.tick_upper);
            };
            if remove > record.liquidity {
                bail!("cannot remove {remove} liquidity from a range holding {}", record.liquidity);
            }
            let before = amounts_in(sqrt_price, &id, record.liquidity)?;
            let after = amounts_in(sqrt_price, &id, record.liquidity - remove)?;
            let returned = TokenAmounts {
                amount0: before.amount0 - after.amount0,
                amount1: before.amount1 - after.amount1,
            };
            let settled = TokenAmounts {
                amount0: mul_div_u128(record.debt.amount0, remove, record.liquidity)?,
                amount1: mul_div_u128(record.debt.amount1, remove, record.liquidity)?,
            };
            record.liquidity -= remove;
            record.debt.amount0 -= settled.amount0;
            record.debt.amount1 -= settled.amount1;
            let emptied = record.liquidity == 0;
            acct.token_balance += signed(returned.amount0)? - signed(settled.amount0)?;
            acct.quote_balance += signed(returned.amount1)? - signed(settled.amount1)?;
            if emptied {
                acct.ranges.remove(&id);
            }
            Ok(RangeChange { liquidity_delta, tokens: returned })
        } else {
            Ok(RangeChange::default())
        }
    }

    fn close_range(&mut self, account: AccountId, id: RangeId) -> Result<RangeChange> {
        let sqrt_price = self.book.sqrt_price_x96;
        let Some(acct) = self.book.accounts.get_mut(&account) else {
            bail!("unknown margin {account}");
        };
        let Some(record) = acct.ranges.remove(&id) else {
            bail!("no range [{}, {}) in {account}", id.tick_lower, id.tick_upper);
        };
        let returned = amounts_in(sqrt_price, &id, record.liquidity)?;
        acct.token_balance += signed(returned.amount0)? - signed(record.debt.amount0)?;
        acct.quote_balance += signed(returned.amount1)? - signed(record.debt.amount1)?;
        Ok(RangeChange {
            liquidity_delta: -signed(record.liquidity)?,
            tokens: returned,
        })
    }

    fn quote_swap(&self, amount: i128, limit: U256) -> Result<SwapResult> {
        let sqrt_price = self.book.sqrt_price_x96;
        let depth = self.pool_liquidity;
        let requested = U256::from(amount.unsigned_abs());
        let fee = u128::from(self.fee_pips);

        if amount < 0 {
            // Selling base pushes the price down towards the limit.
            if limit >= sqrt_price || limit < MIN_SQRT_RATIO {
                return Ok(SwapResult::empty(sqrt_price));
            }
            let capacity = amount0_delta(limit, sqrt_price, depth, false)?;
            let fill = to_u128(capacity.min(requested))?;
            if fill == 0 {
                return Ok(SwapResult::empty(sqrt_price));
            }
            let next = next_sqrt_price_from_amount0_in(sqrt_price, depth, fill)?;
            let gross = to_u128(amount1_delta(next, sqrt_price, depth, false)?)?;
            let out = mul_div_u128(gross, PIPS - fee, PIPS)?;
            Ok(SwapResult {
                token_delta: -signed(fill)?,
                quote_delta: signed(out)?,
                sqrt_price_after: next,
            })
        } else if amount > 0 {
            if limit <= sqrt_price || limit > MAX_SQRT_RATIO {
                return Ok(SwapResult::empty(sqrt_price));
            }
            let capacity = amount0_delta(sqrt_price, limit, depth, false)?;
            let fill = to_u128(capacity.min(requested))?;
            if fill == 0 {
                return Ok(SwapResult::empty(sqrt_price));
            }
            let next = next_sqrt_price_from_amount0_out(sqrt_price, depth, fill)?;
            let gross = to_u128(amount1_delta(sqrt_price, next, depth, true)?)?;
            let cost = mul_div_up_u128(gross, PIPS + fee, PIPS)?;
            Ok(SwapResult {
                token_delta: signed(fill)?,
                quote_delta: -signed(cost)?,
                sqrt_price_after: next,
            })
        } else {
            Ok(SwapResult::empty(sqrt_price))
        }
    }
}

fn amounts_in(sqrt_price: U256, id: &RangeId, liquidity: u128) -> Result<TokenAmounts> {
    let sqrt_a = sqrt_ratio_at_tick(id.tick_lower)?;
    let sqrt_b = sqrt_ratio_at_tick(id.tick_upper)?;
    Ok(amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity)?)
}

// ── Market handle ────────────────────────────────────────────────────

/// Shared simulated market: one pool, its margin accounts and index prices.
#[derive(Clone)]
pub struct SimulatedMarket {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedMarket {
    /// A market whose pool sits at `tick` with `pool_liquidity` of depth.
    pub fn new(pool: PoolId, tick: i32, pool_liquidity: u128, fee_pips: u32) -> Result<Self> {
        let sqrt_price_x96 = sqrt_ratio_at_tick(tick)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                pool,
                pool_liquidity,
                fee_pips,
                book: Book {
                    sqrt_price_x96,
                    accounts: HashMap::new(),
                    swaps: 0,
                },
                checkpoint: None,
                index_prices: HashMap::new(),
                failures: HashSet::new(),
                latency: None,
            })),
        })
    }

    pub fn venue(&self) -> SimulatedVenue {
        SimulatedVenue { market: self.clone() }
    }

    pub fn price_source(&self) -> SimulatedPriceSource {
        SimulatedPriceSource { market: self.clone() }
    }

    /// Move the pool to the exact price of `tick`, as outside flow would.
    pub fn set_tick(&self, tick: i32) -> Result<()> {
        let sqrt_price = sqrt_ratio_at_tick(tick)?;
        self.inner.lock().book.sqrt_price_x96 = sqrt_price;
        Ok(())
    }

    pub fn set_sqrt_price(&self, sqrt_price_x96: U256) -> Result<()> {
        if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
            bail!("sqrt price {sqrt_price_x96} outside the pool's domain");
        }
        self.inner.lock().book.sqrt_price_x96 = sqrt_price_x96;
        Ok(())
    }

    pub fn sqrt_price(&self) -> U256 {
        self.inner.lock().book.sqrt_price_x96
    }

    pub fn tick(&self) -> Result<i32> {
        Ok(tick_at_sqrt_ratio(self.sqrt_price())?)
    }

    pub fn set_index_price(&self, asset: &AssetId, price: PriceX128) {
        self.inner.lock().index_prices.insert(asset.clone(), price);
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: VenueOp) {
        self.inner.lock().failures.insert(op);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().latency = latency;
    }

    /// Credit (or debit) an account's trader token balance directly.
    pub fn adjust_token_balance(&self, account: AccountId, delta: i128) {
        let mut inner = self.inner.lock();
        inner.book.accounts.entry(account).or_default().token_balance += delta;
    }

    pub fn net_token_position(&self, account: AccountId) -> Result<i128> {
        self.inner.lock().net_token_position(account)
    }

    pub fn collateral(&self, account: AccountId) -> u128 {
        self.inner.lock().account(account).map(|a| a.collateral).unwrap_or(0)
    }

    /// Open ranges of an account as `(range, liquidity)`.
    pub fn ranges(&self, account: AccountId) -> Vec<(RangeId, u128)> {
        self.inner
            .lock()
            .account(account)
            .map(|a| a.ranges.iter().map(|(id, r)| (*id, r.liquidity)).collect())
            .unwrap_or_default()
    }

    pub fn swap_count(&self) -> u64 {
        self.inner.lock().book.swaps
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.lock().checkpoint.is_some()
    }

    async fn enter(&self, op: VenueOp) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.failures.remove(&op) {
                bail!("simulated {op:?} failure");
            }
        }
        let latency = self.inner.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

// ── Venue view ───────────────────────────────────────────────────────

/// [`MarginVenue`] view of a [`SimulatedMarket`].
#[derive(Clone)]
pub struct SimulatedVenue {
    market: SimulatedMarket,
}

#[async_trait]
impl MarginVenue for SimulatedVenue {
    async fn collateral_balance(&self, account: AccountId) -> Result<u128> {
        self.market.enter(VenueOp::CollateralBalance).await?;
        Ok(self.market.collateral(account))
    }

    async fn deposit_collateral(&mut self, account: AccountId, amount: u128) -> Result<()> {
        self.market.enter(VenueOp::DepositCollateral).await?;
        let mut inner = self.market.inner.lock();
        let acct = inner.book.accounts.entry(account).or_default();
        acct.collateral = acct.collateral.checked_add(amount).context("collateral overflow")?;
        Ok(())
    }

    async fn withdraw_collateral(&mut self, account: AccountId, amount: u128) -> Result<()> {
        self.market.enter(VenueOp::WithdrawCollateral).await?;
        let mut inner = self.market.inner.lock();
        let acct = inner.book.accounts.entry(account).or_default();
        if amount > acct.collateral {
            bail!("withdrawing {amount} collateral, {} posted", acct.collateral);
        }
        acct.collateral -= amount;
        Ok(())
    }

    async fn net_token_position(&self, account: AccountId, pool: PoolId) -> Result<i128> {
        self.market.enter(VenueOp::NetTokenPosition).await?;
        let inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        inner.net_token_position(account)
    }

    async fn net_position_value(&self, account: AccountId, pool: PoolId, index_price: PriceX128) -> Result<i128> {
        self.market.enter(VenueOp::NetPositionValue).await?;
        let inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        inner.net_position_value(account, index_price)
    }

    async fn open_range(
        &mut self,
        account: AccountId,
        pool: PoolId,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
    ) -> Result<RangeChange> {
        self.market.enter(VenueOp::OpenRange).await?;
        let mut inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        inner.modify_range(account, RangeId { tick_lower, tick_upper }, liquidity_delta)
    }

    async fn close_range(&mut self, account: AccountId, pool: PoolId, range: RangeId) -> Result<RangeChange> {
        self.market.enter(VenueOp::CloseRange).await?;
        let mut inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        inner.close_range(account, range)
    }

    async fn settle_to_collateral(
        &mut self,
        account: AccountId,
        pool: PoolId,
        quote: u128,
        asset_price: PriceX128,
    ) -> Result<u128> {
        self.market.enter(VenueOp::SettleToCollateral).await?;
        let mut inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        let credited = asset_price.amount_for(quote)?;
        let acct = inner.book.accounts.entry(account).or_default();
        acct.quote_balance = acct
            .quote_balance
            .checked_sub(signed(quote)?)
            .context("settlement balance underflow")?;
        acct.collateral = acct.collateral.checked_add(credited).context("collateral overflow")?;
        Ok(credited)
    }

    async fn quote_swap(&self, pool: PoolId, amount: i128, sqrt_price_limit: U256) -> Result<SwapResult> {
        self.market.enter(VenueOp::QuoteSwap).await?;
        let inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        inner.quote_swap(amount, sqrt_price_limit)
    }

    async fn swap(
        &mut self,
        account: AccountId,
        pool: PoolId,
        amount: i128,
        sqrt_price_limit: U256,
        partial_allowed: bool,
    ) -> Result<SwapResult> {
        self.market.enter(VenueOp::Swap).await?;
        let mut inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        let result = inner.quote_swap(amount, sqrt_price_limit)?;
        if !partial_allowed && result.filled() < amount.unsigned_abs() {
            bail!(
                "swap of {amount} would cross the price limit after {}",
                result.filled()
            );
        }
        let acct = inner.book.accounts.entry(account).or_default();
        acct.token_balance += result.token_delta;
        acct.quote_balance += result.quote_delta;
        inner.book.sqrt_price_x96 = result.sqrt_price_after;
        inner.book.swaps += 1;
        Ok(result)
    }

    async fn begin(&mut self) -> Result<()> {
        self.market.enter(VenueOp::Begin).await?;
        let mut inner = self.market.inner.lock();
        if inner.checkpoint.is_some() {
            bail!("transaction already open");
        }
        inner.checkpoint = Some(inner.book.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.market.enter(VenueOp::Commit).await?;
        let mut inner = self.market.inner.lock();
        if inner.checkpoint.take().is_none() {
            bail!("commit without an open transaction");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut inner = self.market.inner.lock();
        match inner.checkpoint.take() {
            Some(book) => {
                inner.book = book;
                Ok(())
            }
            None => bail!("rollback without an open transaction"),
        }
    }
}

// ── Price view ───────────────────────────────────────────────────────

/// [`PriceSource`] view of a [`SimulatedMarket`].
#[derive(Clone)]
pub struct SimulatedPriceSource {
    market: SimulatedMarket,
}

#[async_trait]
impl PriceSource for SimulatedPriceSource {
    async fn current_tick(&self, pool: PoolId) -> Result<i32> {
        self.market.enter(VenueOp::CurrentTick).await?;
        self.market.inner.lock().check_pool(pool)?;
        self.market.tick()
    }

    async fn sqrt_price_x96(&self, pool: PoolId) -> Result<U256> {
        self.market.enter(VenueOp::SqrtPrice).await?;
        let inner = self.market.inner.lock();
        inner.check_pool(pool)?;
        Ok(inner.book.sqrt_price_x96)
    }

    async fn index_price(&self, asset: &AssetId) -> Result<PriceX128> {
        self.market.enter(VenueOp::IndexPrice).await?;
        self.market
            .inner
            .lock()
            .index_prices
            .get(asset)
            .copied()
            .with_context(|| format!("no index price for {asset}"))
    }
}
