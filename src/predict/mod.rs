//! Serving: delta prediction, price reconstruction, and the query surface.

pub mod predictor;
pub mod reconstruct;
pub mod service;

pub use predictor::Predictor;
pub use reconstruct::{reconstruct, run_update_cycle, ConsistencyFlag, Forecast};
pub use service::PredictionService;
