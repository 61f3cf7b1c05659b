//! Supervised feature construction.

pub mod builder;
pub mod dataset;

pub use builder::{build_rows, next_day_features, FeatureRow};
pub use dataset::{Dataset, Split};
