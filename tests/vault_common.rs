#![allow(dead_code)]

use alloy::primitives::Address;

use delta_vault::math::PriceX128;
use delta_vault::model::{AccountId, AssetId, PoolId, SizingParams, VaultConfig};
use delta_vault::vault::{RebalanceOutcome, RebalanceReport, Vault, compute_range};
use delta_vault::venues::sim::{SimulatedMarket, SimulatedYield};

// ── Constants ────────────────────────────────────────────────────────

pub const E18: u128 = 1_000_000_000_000_000_000;
pub const POOL: PoolId = PoolId(1);
pub const ACCOUNT: AccountId = AccountId(1);
/// ETH at roughly 3980 USDC (18-decimal base, 6-decimal quote).
pub const INITIAL_TICK: i32 = -193_380;
/// Tick of ETH at 4500.672 USDC.
pub const MOVED_TICK: i32 = -192_201;

pub fn owner() -> Address {
    Address::repeat_byte(0x0a)
}

pub fn keeper() -> Address {
    Address::repeat_byte(0x0b)
}

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn sdai() -> AssetId {
    AssetId::new("sDAI")
}

pub fn eth() -> AssetId {
    AssetId::new("ETH")
}

/// One USDC (6 decimals) per 18-decimal asset unit.
pub fn dollar() -> PriceX128 {
    PriceX128::from_ratio(1_000_000, E18).unwrap()
}

pub fn config() -> VaultConfig {
    VaultConfig::new("test vault", owner(), keeper(), sdai(), eth(), 1_000 * E18)
}

/// Pool depth equal to a range holding `usd` dollars at the initial tick.
pub fn depth_for_usd(usd: u128) -> u128 {
    compute_range(usd * 1_000_000, INITIAL_TICK, &SizingParams::default())
        .unwrap()
        .liquidity
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub vault: Vault,
    pub market: SimulatedMarket,
    pub yield_source: SimulatedYield,
}

impl Harness {
    /// Vault over a pool about 25,000 times deeper than a $40 deposit.
    pub fn new(config: VaultConfig) -> Self {
        Self::with_depth(config, depth_for_usd(1_000_000))
    }

    pub fn with_depth(config: VaultConfig, depth: u128) -> Self {
        let market = SimulatedMarket::new(POOL, INITIAL_TICK, depth, 500).unwrap();
        let yield_source = SimulatedYield::new();
        let vault = Vault::new(
            config,
            Box::new(market.venue()),
            Box::new(market.price_source()),
            Box::new(yield_source.clone()),
        )
        .unwrap();
        let harness = Self { vault, market, yield_source };
        harness.market.set_index_price(&sdai(), dollar());
        harness.sync_index_price();
        harness
    }

    /// Move the pool to `tick` and mark ETH at the new pool price.
    pub fn move_to_tick(&self, tick: i32) {
        self.market.set_tick(tick).unwrap();
        self.sync_index_price();
    }

    /// Move the pool and the ETH index to `price`.
    pub fn move_to_price(&self, price: PriceX128) {
        self.market.set_sqrt_price(price.to_sqrt_price_x96()).unwrap();
        self.market.set_index_price(&eth(), price);
    }

    fn sync_index_price(&self) {
        let price = PriceX128::from_sqrt_price_x96(self.market.sqrt_price()).unwrap();
        self.market.set_index_price(&eth(), price);
    }

    pub fn net_position(&self) -> i128 {
        self.market.net_token_position(ACCOUNT).unwrap()
    }

    /// Rebalance that must go through.
    pub async fn rebalance(&mut self, now: u64) -> RebalanceReport {
        match self.vault.rebalance(keeper(), now).await.unwrap() {
            RebalanceOutcome::Rebalanced(report) => report,
            RebalanceOutcome::NotDue => panic!("rebalance at {now} was not due"),
        }
    }
}

/// Config whose reset threshold trips on any leftover exposure.
pub fn hair_trigger_config() -> VaultConfig {
    let mut config = config();
    config.close.reset_position_threshold_bps = 1;
    config
}

/// A vault holding a $40 deposit whose range was recentred after ETH moved to
/// `tick`, leaving it in the reset state.
pub async fn vault_in_reset(config: VaultConfig, depth: u128, tick: i32) -> Harness {
    let mut h = Harness::with_depth(config, depth);
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.move_to_tick(tick);
    let report = h.rebalance(1_000).await;
    assert!(report.reset_triggered, "expected a reset, net {}", report.net_position);
    assert!(h.vault.is_reset());
    h
}
