pub mod config;
pub mod ids;
pub mod snapshot;
pub mod state;

pub use config::{CloseParams, RebalanceParams, SizingParams, TickRounding, VaultConfig};
pub use ids::{AccountId, AssetId, PoolId};
pub use snapshot::ValueSnapshot;
pub use state::{HedgeRange, VaultState};
