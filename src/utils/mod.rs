//! Shared helpers used by model backends

pub mod preprocessing;

pub use preprocessing::{Letterbox, TensorPreprocessor};
