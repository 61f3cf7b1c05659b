//! Price data: types, delta transformation, and tabular stores.

pub mod deltas;
pub mod store;
pub mod types;

pub use deltas::{compute_deltas, delta_from_pair};
pub use store::{DeltaStore, OhlcStore, TableStore};
pub use types::{date_ordinal_ms, Channel, ChannelDeltas, DeltaBar, OhlcBar};
