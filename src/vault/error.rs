use alloy::primitives::Address;
use thiserror::Error;

use super::access::Role;
use crate::math::MathError;
use crate::validate::ConfigError;

/// Coarse category of a [`VaultError`], for callers that only need to decide
/// whether to retry, fix input, or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the required role.
    Authorization,
    /// Deposit cap, share balance or withdrawable balance exceeded.
    Capacity,
    /// An unwind step could not fill within the price tolerance.
    Slippage,
    /// A collaborator call failed or timed out.
    External,
    /// The operation would break a vault invariant.
    Invariant,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("caller {caller} does not hold the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error("deposit of {amount} would bring total assets to {total_after}, above the cap of {cap}")]
    DepositCapExceeded { amount: u128, total_after: u128, cap: u128 },

    #[error("holder {holder} has {available} shares, {requested} requested")]
    InsufficientShares {
        holder: Address,
        available: u128,
        requested: u128,
    },

    #[error("vault holds {available} assets, {requested} requested")]
    InsufficientLiquidity { available: u128, requested: u128 },

    #[error("no fill for net position {net_position} within {tolerance_bps} bps of the pool price")]
    SlippageExceeded { net_position: i128, tolerance_bps: u16 },

    #[error("external call `{op}` failed: {source:#}")]
    External {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("external call `{op}` timed out after {timeout_ms} ms")]
    Timeout { op: &'static str, timeout_ms: u64 },

    #[error("a position reset is pending; the net position must be unwound first")]
    ResetPending,

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("range [{tick_lower}, {tick_upper}) is not valid for tick spacing {spacing}")]
    InvalidRange {
        tick_lower: i32,
        tick_upper: i32,
        spacing: i32,
    },

    #[error("unwind step left the net position at {after} (was {before})")]
    UnwindStalled { before: i128, after: i128 },

    #[error("invalid parameters: {}", join(.0))]
    InvalidParams(Vec<ConfigError>),

    #[error(transparent)]
    Math(#[from] MathError),
}

fn join(errors: &[ConfigError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::DepositCapExceeded { .. }
            | Self::InsufficientShares { .. }
            | Self::InsufficientLiquidity { .. } => ErrorKind::Capacity,
            Self::SlippageExceeded { .. } => ErrorKind::Slippage,
            Self::External { .. } | Self::Timeout { .. } => ErrorKind::External,
            Self::ResetPending
            | Self::InvalidAmount(_)
            | Self::InvalidRange { .. }
            | Self::UnwindStalled { .. }
            | Self::InvalidParams(_)
            | Self::Math(_) => ErrorKind::Invariant,
        }
    }

    /// Slippage and collaborator failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Slippage | ErrorKind::External)
    }

    pub(crate) fn external(op: &'static str, source: anyhow::Error) -> Self {
        Self::External { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_retryability() {
        let e = VaultError::external("swap", anyhow::anyhow!("rpc down"));
        assert_eq!(e.kind(), ErrorKind::External);
        assert!(e.is_retryable());
        assert!(e.to_string().contains("rpc down"));

        let e = VaultError::ResetPending;
        assert_eq!(e.kind(), ErrorKind::Invariant);
        assert!(!e.is_retryable());

        let e = VaultError::SlippageExceeded { net_position: -5, tolerance_bps: 100 };
        assert!(e.is_retryable());

        let e = VaultError::from(MathError::Overflow("x"));
        assert_eq!(e.kind(), ErrorKind::Invariant);
    }
}
