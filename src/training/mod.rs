//! 学習データの組み立てと分類器の学習。
pub mod bootstrap;
pub mod controller;
pub mod split;

pub use controller::{TrainingController, TrainingOutcome, TrainingReport};
