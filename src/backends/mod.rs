//! Segmentation model backends
//!
//! - Tract backend (pure Rust ONNX inference, enabled by the `tract` feature)

#[cfg(feature = "tract")]
pub mod tract;

// Mock models for unit tests
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "tract")]
pub use self::tract::TractSegmentationModel;
