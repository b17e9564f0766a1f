mod vault_common;

use delta_vault::math::PriceX128;
use delta_vault::vault::RebalanceOutcome;
use delta_vault::venues::RangeId;
use vault_common::*;

// ── Two deposits, a price move and a recentre ───────────────────────

#[tokio::test]
async fn test_deposits_then_recentre_after_price_move() {
    let mut h = Harness::new(config());

    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.vault.deposit(bob(), 10 * E18).await.unwrap();

    assert_eq!(h.vault.total_shares(), 50 * E18);
    assert_eq!(h.vault.shares_of(&alice()), 40 * E18);
    assert_eq!(h.vault.shares_of(&bob()), 10 * E18);
    assert_eq!(h.vault.total_assets().await.unwrap(), 50 * E18);

    let initial = h.vault.state().range.unwrap();
    assert_eq!((initial.tick_lower, initial.tick_upper), (-197_850, -188_910));
    assert_eq!(h.net_position(), 0);

    // ETH rallies to 4500.672 USDC.
    h.move_to_price(PriceX128::from_ratio(4_500_672_000, E18).unwrap());
    assert_eq!(h.market.tick().unwrap(), MOVED_TICK);
    assert!(h.vault.should_rebalance(1_000).await.unwrap());

    let report = h.rebalance(1_000).await;
    let current = h.vault.state().range.unwrap();
    assert_eq!((current.tick_lower, current.tick_upper), (-196_670, -187_730));
    assert_eq!(current.liquidity, initial.liquidity);
    assert_eq!(report.previous, Some(initial));
    assert_eq!(report.current, Some(current));
    assert!(!report.reset_triggered);
    assert!(!h.vault.is_reset());
    assert_eq!(h.vault.state().rebalance.last_rebalance_timestamp, 1_000);

    let id = RangeId { tick_lower: -196_670, tick_upper: -187_730 };
    assert_eq!(h.market.ranges(ACCOUNT), vec![(id, initial.liquidity)]);

    // The range sold ETH into the rally, leaving the vault short.
    assert!(report.net_position < 0);
    assert_eq!(h.net_position(), report.net_position);
}

#[tokio::test]
async fn test_immediate_second_rebalance_is_not_due() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.vault.deposit(bob(), 10 * E18).await.unwrap();
    h.move_to_price(PriceX128::from_ratio(4_500_672_000, E18).unwrap());
    h.rebalance(1_000).await;

    let state = h.vault.state().clone();
    let outcome = h.vault.rebalance(keeper(), 1_000).await.unwrap();
    assert_eq!(outcome, RebalanceOutcome::NotDue);
    assert_eq!(h.vault.state(), &state);
}

#[tokio::test]
async fn test_snapshot_reads_are_deterministic() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.move_to_tick(MOVED_TICK);

    let first = h.vault.snapshot().await.unwrap();
    let second = h.vault.snapshot().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.vault.get_vault_market_value().await.unwrap(), first.market_value);
    assert_eq!(h.vault.total_assets().await.unwrap(), first.total_assets);
}

#[tokio::test]
async fn test_value_tracks_price_and_yield() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    let flat = h.vault.snapshot().await.unwrap();
    assert_eq!(flat.total_assets, 40 * E18);
    assert_eq!(flat.margin_collateral, 8 * E18);
    assert_eq!(flat.idle_balance, 32 * E18);
    // Marked at $1, give or take the price's fixed-point rounding.
    assert!(flat.market_value.abs_diff(40_000_000) <= 1);

    h.yield_source.accrue(E18);
    assert_eq!(h.vault.total_assets().await.unwrap(), 41 * E18);

    // A range loses against holding when the price moves either way.
    h.move_to_tick(MOVED_TICK);
    let moved = h.vault.snapshot().await.unwrap();
    assert!(moved.total_assets < 41 * E18);
    assert!(moved.net_position_value < 0);
    assert!(moved.range_value > 0);
}
