use alloy::primitives::address;

use delta_vault::model::{AccountId, AssetId, CloseParams, PoolId, RebalanceParams, SizingParams, VaultConfig};

/// Print an example vault config JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let config = VaultConfig {
        name: "sDAI / ETH delta-neutral".to_string(),
        owner: address!("0x00000000000000000000000000000000000000a1"),
        keeper: address!("0x00000000000000000000000000000000000000b2"),
        account: AccountId(1),
        pool: PoolId(1),
        yield_asset: AssetId::new("sDAI"),
        base_asset: AssetId::new("ETH"),
        asset_decimals: 18,
        base_decimals: 18,
        quote_decimals: 6,
        // 1,000,000 sDAI
        deposit_cap: 1_000_000 * 10u128.pow(18),
        collateral_share_bps: 2_000,
        withdraw_fee_bps: 0,
        call_timeout_ms: Some(10_000),
        sizing: SizingParams::default(),
        rebalance: RebalanceParams {
            rebalance_time_threshold_secs: 7 * 86_400,
            rebalance_price_threshold_bps: 1_000,
            ..RebalanceParams::default()
        },
        close: CloseParams {
            close_position_slippage_sqrt_tolerance_bps: 50,
            ..CloseParams::default()
        },
    };

    let json = serde_json::to_string_pretty(&config)?;
    println!("{json}");
    Ok(())
}
