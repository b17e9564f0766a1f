use super::ConfigError;
use crate::model::{CloseParams, RebalanceParams, SizingParams};

const PIPS: u32 = 1_000_000;

pub(super) fn check_bps(field: &'static str, value: u16, min: u16, max: u16) -> Option<ConfigError> {
    (value < min || value > max).then_some(ConfigError::BpsOutOfRange { field, value, min, max })
}

/// Range band, tick spacing and hedge share.
pub fn check_sizing(params: &SizingParams) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let (lower, upper) = (params.sqrt_price_factor_lower_pips, params.sqrt_price_factor_upper_pips);
    if lower == 0 || lower >= PIPS || upper <= PIPS {
        errors.push(ConfigError::SqrtFactorBand { lower, upper });
    }
    if params.tick_spacing <= 0 || params.tick_spacing > 16_384 {
        errors.push(ConfigError::TickSpacing { spacing: params.tick_spacing });
    }
    errors.extend(check_bps("hedge_share_bps", params.hedge_share_bps, 0, 10_000));
    errors
}

pub fn check_rebalance(params: &RebalanceParams) -> Vec<ConfigError> {
    check_bps(
        "rebalance_price_threshold_bps",
        params.rebalance_price_threshold_bps,
        1,
        u16::MAX,
    )
    .into_iter()
    .collect()
}

/// Slippage tolerance must leave a positive price limit; the reset threshold
/// must be positive or every rebalance would flag a reset.
pub fn check_close(params: &CloseParams) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    errors.extend(check_bps(
        "close_position_slippage_sqrt_tolerance_bps",
        params.close_position_slippage_sqrt_tolerance_bps,
        1,
        9_999,
    ));
    errors.extend(check_bps(
        "reset_position_threshold_bps",
        params.reset_position_threshold_bps,
        1,
        u16::MAX,
    ));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(check_sizing(&SizingParams::default()).is_empty());
        assert!(check_rebalance(&RebalanceParams::default()).is_empty());
        assert!(check_close(&CloseParams::default()).is_empty());
    }

    #[test]
    fn collects_every_sizing_error() {
        let params = SizingParams {
            sqrt_price_factor_lower_pips: 1_100_000,
            sqrt_price_factor_upper_pips: 1_250_000,
            tick_spacing: 0,
            hedge_share_bps: 12_000,
            ..SizingParams::default()
        };
        assert_eq!(check_sizing(&params).len(), 3);
    }

    #[test]
    fn zero_slippage_rejected() {
        let params = CloseParams {
            close_position_slippage_sqrt_tolerance_bps: 0,
            ..CloseParams::default()
        };
        let errors = check_close(&params);
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::BpsOutOfRange { field: "close_position_slippage_sqrt_tolerance_bps", .. }]
        ));
    }
}
