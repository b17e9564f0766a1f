mod vault_common;

use alloy::primitives::Address;

use delta_vault::Vault;
use delta_vault::model::{CloseParams, RebalanceParams, SizingParams, VaultState};
use delta_vault::venues::sim::{SimulatedMarket, SimulatedYield};
use delta_vault::{ErrorKind, VaultError};
use vault_common::*;

// ── Owner controls ───────────────────────────────────────────────────

#[tokio::test]
async fn test_owner_controls_reject_everyone_else() {
    let mut h = Harness::new(config());
    for caller in [keeper(), alice()] {
        let errors = [
            h.vault.set_keeper(caller, alice()).unwrap_err(),
            h.vault.set_deposit_cap(caller, 1).unwrap_err(),
            h.vault.set_rebalance_params(caller, RebalanceParams::default()).unwrap_err(),
            h.vault.set_close_params(caller, CloseParams::default()).unwrap_err(),
            h.vault.set_sizing_params(caller, SizingParams::default()).unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Authorization, "{err}");
        }
    }
    assert_eq!(h.vault.state().keeper, keeper());
}

#[tokio::test]
async fn test_keeper_handover() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    let new_keeper = Address::repeat_byte(0xcc);

    assert!(h.vault.set_keeper(owner(), Address::ZERO).is_err());
    h.vault.set_keeper(owner(), new_keeper).unwrap();

    let err = h.vault.rebalance(keeper(), 86_400).await.unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized { .. }));
    h.vault.rebalance(new_keeper, 86_400).await.unwrap();
}

#[tokio::test]
async fn test_deposit_cap_update_applies_to_next_deposit() {
    let mut h = Harness::new(config());
    h.vault.set_deposit_cap(owner(), 10 * E18).unwrap();
    assert!(h.vault.deposit(alice(), 11 * E18).await.is_err());
    h.vault.set_deposit_cap(owner(), 11 * E18).unwrap();
    h.vault.deposit(alice(), 11 * E18).await.unwrap();
}

#[tokio::test]
async fn test_rebalance_params_keep_last_timestamp() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.rebalance(86_400).await;

    let params = RebalanceParams {
        last_rebalance_timestamp: 0,
        rebalance_time_threshold_secs: 3_600,
        ..RebalanceParams::default()
    };
    h.vault.set_rebalance_params(owner(), params).unwrap();
    assert_eq!(h.vault.state().rebalance.last_rebalance_timestamp, 86_400);
    assert_eq!(h.vault.state().rebalance.rebalance_time_threshold_secs, 3_600);

    let bad = RebalanceParams { rebalance_price_threshold_bps: 0, ..RebalanceParams::default() };
    let err = h.vault.set_rebalance_params(owner(), bad).unwrap_err();
    assert!(matches!(err, VaultError::InvalidParams(_)));
}

#[tokio::test]
async fn test_close_params_are_validated() {
    let mut h = Harness::new(config());
    let bad = CloseParams { close_position_slippage_sqrt_tolerance_bps: 10_000, ..CloseParams::default() };
    let err = h.vault.set_close_params(owner(), bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);

    let good = CloseParams { reset_position_threshold_bps: 500, ..CloseParams::default() };
    h.vault.set_close_params(owner(), good.clone()).unwrap();
    assert_eq!(h.vault.state().close, good);
}

#[tokio::test]
async fn test_sizing_params_must_keep_open_range_aligned() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();

    let inverted = SizingParams { sqrt_price_factor_lower_pips: 1_100_000, ..SizingParams::default() };
    assert!(matches!(
        h.vault.set_sizing_params(owner(), inverted).unwrap_err(),
        VaultError::InvalidParams(_)
    ));

    // [-197850, -188910] is not a multiple of 7.
    let misaligned = SizingParams { tick_spacing: 7, ..SizingParams::default() };
    assert!(matches!(
        h.vault.set_sizing_params(owner(), misaligned).unwrap_err(),
        VaultError::InvalidRange { spacing: 7, .. }
    ));

    let aligned = SizingParams { tick_spacing: 30, ..SizingParams::default() };
    h.vault.set_sizing_params(owner(), aligned).unwrap();
    assert_eq!(h.vault.state().sizing.tick_spacing, 30);
}

// ── Harvest ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_harvest_moves_yield_into_idle_balance() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.yield_source.accrue(2 * E18);
    let before = h.vault.total_assets().await.unwrap();
    assert_eq!(before, 42 * E18);

    assert_eq!(h.vault.harvest(keeper()).await.unwrap(), 2 * E18);
    assert_eq!(h.vault.state().idle_balance, 34 * E18);
    assert_eq!(h.yield_source.pending(), 0);
    assert_eq!(h.vault.total_assets().await.unwrap(), before);
}

#[tokio::test]
async fn test_harvest_failures_leave_state_alone() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.yield_source.accrue(E18);

    let err = h.vault.harvest(alice()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.yield_source.fail_next_harvest();
    let err = h.vault.harvest(keeper()).await.unwrap_err();
    assert!(matches!(err, VaultError::External { op: "harvest", .. }), "{err}");
    assert_eq!(h.vault.state().idle_balance, 32 * E18);
    assert_eq!(h.yield_source.pending(), E18);
}

// ── Construction and persistence ─────────────────────────────────────

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = config();
    config.sizing.hedge_share_bps = 12_000;
    config.keeper = Address::ZERO;
    let market = SimulatedMarket::new(POOL, INITIAL_TICK, 1, 500).unwrap();
    let result = Vault::new(
        config,
        Box::new(market.venue()),
        Box::new(market.price_source()),
        Box::new(SimulatedYield::new()),
    );
    match result {
        Err(VaultError::InvalidParams(errors)) => assert_eq!(errors.len(), 2, "{errors:?}"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("invalid config accepted"),
    }
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = std::env::temp_dir().join(format!("delta_vault_restart_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("state.json");

    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.vault.deposit(bob(), 10 * E18).await.unwrap();
    h.vault.save_state(&path).unwrap();
    let snapshot = h.vault.snapshot().await.unwrap();

    let state = VaultState::load_or_new(&path, &config()).unwrap();
    assert_eq!(&state, h.vault.state());
    let resumed = Vault::with_state(
        config(),
        state,
        Box::new(h.market.venue()),
        Box::new(h.market.price_source()),
        Box::new(h.yield_source.clone()),
    )
    .unwrap();
    assert_eq!(resumed.snapshot().await.unwrap(), snapshot);
    assert_eq!(resumed.shares_of(&bob()), 10 * E18);

    std::fs::remove_dir_all(&dir).ok();
}
