//! # deltacast
//!
//! Next-day OHLC forecasting on a stationary delta representation.
//!
//! Raw daily bars become per-day deltas (open vs prior close, high/low/close
//! vs open); lagging those deltas by one day yields supervised rows; a
//! tournament over several regression families picks a champion per target
//! channel; serving reconstructs absolute prices from the predicted deltas
//! and the last realized bar. An online-update path folds newly observed
//! days back into the stores and the champions.
//!
//! ## Modules
//!
//! - `api` - historical quote collaborator
//! - `config` - immutable run configuration
//! - `data` - OHLC/delta types, delta transformation, CSV stores
//! - `features` - lagged feature rows and training datasets
//! - `models` - regression families behind one trait
//! - `train` - per-channel model tournament
//! - `registry` - champion artifact persistence
//! - `predict` - predictor, reconstructor, query service

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod predict;
pub mod registry;
pub mod train;

pub use config::{Config, LagPolicy};
pub use data::{compute_deltas, Channel, ChannelDeltas, DeltaBar, OhlcBar};
pub use error::{DeltacastError, Result};
pub use features::{build_rows, Dataset, FeatureRow};
pub use predict::{run_update_cycle, Forecast, PredictionService, Predictor};
pub use registry::ModelRegistry;
pub use train::{train_best, ChampionModel};
