//! In-memory collaborators for backtests and tests.
//!
//! One [`SimulatedMarket`] owns the pool, the margin accounts and the index
//! prices. The venue and price source handed to a vault are views onto it,
//! so a test (or the backtest driver) can move prices underneath the vault.

pub mod market;
pub mod yield_source;

pub use market::{SimulatedMarket, SimulatedPriceSource, SimulatedVenue, VenueOp};
pub use yield_source::SimulatedYield;
