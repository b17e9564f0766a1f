mod vault_common;

use delta_vault::model::VaultConfig;
use delta_vault::{ErrorKind, VaultError};
use vault_common::*;

/// Tight tolerance and a one-cent dust threshold so the unwind takes several steps.
fn stepwise_config() -> VaultConfig {
    let mut config = hair_trigger_config();
    config.close.close_position_slippage_sqrt_tolerance_bps = 1;
    config.close.min_notional_position_to_close_threshold = 10_000;
    config
}

/// Pool about sixty times deeper than the vault's own range.
fn shallow_depth() -> u128 {
    depth_for_usd(40) * 60
}

// ── Convergence ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_unwind_converges_in_bounded_steps() {
    let mut h = vault_in_reset(stepwise_config(), shallow_depth(), MOVED_TICK).await;
    let start = h.net_position();
    assert!(start < 0);

    let mut steps = Vec::new();
    while h.vault.is_reset() {
        assert!(steps.len() < 100, "unwind did not converge");
        let step = h.vault.close_token_position(keeper()).await.unwrap();
        assert!(step.net_after.unsigned_abs() < step.net_before.unsigned_abs());
        // Short exposure is bought back.
        assert!(step.traded > 0);
        steps.push(step);
    }

    assert!(steps.len() > 1, "expected several bounded steps");
    let last = steps.last().unwrap();
    assert!(last.forced && last.reset_cleared);
    assert!(steps[..steps.len() - 1].iter().all(|s| !s.forced && !s.reset_cleared));
    // The forced close moves the pool a little, so the range leaves a residue.
    assert!(h.net_position().unsigned_abs() < start.unsigned_abs() / 100);
    assert_eq!(h.market.swap_count(), steps.len() as u64);

    // Rebalancing is allowed again.
    h.vault.rebalance(keeper(), 200_000).await.unwrap();
}

#[tokio::test]
async fn test_dust_position_closes_in_one_call() {
    // Default dust threshold is $100, far above the exposure of a $40 vault.
    let mut h = vault_in_reset(hair_trigger_config(), depth_for_usd(1_000_000), MOVED_TICK).await;
    let net = h.net_position();

    let step = h.vault.close_token_position(keeper()).await.unwrap();
    assert!(step.forced);
    assert!(step.reset_cleared);
    assert_eq!(step.net_before, net);
    assert_eq!(step.traded, -net);
    assert!(step.quote_delta < 0);
    assert!(step.net_after.unsigned_abs() < net.unsigned_abs() / 1_000);
    assert!(!h.vault.is_reset());
}

// ── Neutral and unflagged positions ──────────────────────────────────

#[tokio::test]
async fn test_neutral_position_does_not_trade() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    assert_eq!(h.net_position(), 0);

    let step = h.vault.close_token_position(keeper()).await.unwrap();
    assert!(step.is_complete());
    assert!(!step.reset_cleared);
    assert_eq!(step.traded, 0);
    assert_eq!(h.market.swap_count(), 0);
}

#[tokio::test]
async fn test_neutral_position_clears_pending_reset() {
    let mut h = vault_in_reset(hair_trigger_config(), depth_for_usd(1_000_000), MOVED_TICK).await;
    // Exposure hedged elsewhere.
    h.market.adjust_token_balance(ACCOUNT, -h.net_position());

    let step = h.vault.close_token_position(keeper()).await.unwrap();
    assert!(step.is_complete());
    assert!(step.reset_cleared);
    assert!(!h.vault.is_reset());
    assert_eq!(h.market.swap_count(), 0);
}

#[tokio::test]
async fn test_unwind_without_reset_leaves_flag_clear() {
    let mut h = Harness::new(config());
    h.vault.deposit(alice(), 40 * E18).await.unwrap();
    h.market.adjust_token_balance(ACCOUNT, 1_000_000_000_000_000);

    let step = h.vault.close_token_position(keeper()).await.unwrap();
    assert_eq!(step.net_before, 1_000_000_000_000_000);
    assert_eq!(step.traded, -1_000_000_000_000_000);
    assert!(step.quote_delta > 0);
    assert!(!step.reset_cleared);
    assert!(!h.vault.is_reset());
}

// ── Failures ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_no_depth_within_tolerance_is_slippage() {
    let mut h = vault_in_reset(stepwise_config(), 1, MOVED_TICK).await;
    let state = h.vault.state().clone();
    let net = h.net_position();

    let err = h.vault.close_token_position(keeper()).await.unwrap_err();
    assert!(matches!(err, VaultError::SlippageExceeded { tolerance_bps: 1, .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Slippage);
    assert!(err.is_retryable());

    assert_eq!(h.vault.state(), &state);
    assert!(h.vault.is_reset());
    assert_eq!(h.net_position(), net);
    assert_eq!(h.market.swap_count(), 0);
    assert!(!h.market.in_transaction());
}

#[tokio::test]
async fn test_unwind_is_keeper_only() {
    let mut h = vault_in_reset(hair_trigger_config(), depth_for_usd(1_000_000), MOVED_TICK).await;
    let err = h.vault.close_token_position(alice()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(h.vault.is_reset());
    assert_eq!(h.market.swap_count(), 0);
}
