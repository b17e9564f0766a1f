use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use super::error::VaultError;
use crate::model::VaultState;

/// Privileged roles. Deposits, withdrawals and reads are open to anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Keeper,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Keeper => f.write_str("keeper"),
        }
    }
}

impl Role {
    pub fn holder(&self, state: &VaultState) -> Address {
        match self {
            Role::Owner => state.owner,
            Role::Keeper => state.keeper,
        }
    }
}

/// Fails with an authorization error unless `caller` holds `role`.
pub fn require(state: &VaultState, caller: Address, role: Role) -> Result<(), VaultError> {
    if role.holder(state) == caller {
        Ok(())
    } else {
        tracing::warn!(%caller, %role, "rejected unauthorized call");
        Err(VaultError::Unauthorized { caller, role })
    }
}
