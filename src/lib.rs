pub mod math;
pub mod model;
pub mod validate;
pub mod vault;
pub mod venues;

#[cfg(feature = "full")]
pub mod backtest;
#[cfg(feature = "full")]
pub mod data;

pub use vault::{ErrorKind, Role, Vault, VaultError};
