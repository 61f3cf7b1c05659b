//! Model training and champion selection.

pub mod trainer;

pub use trainer::{train_best, ChampionModel};
