//! Services shared across pipeline stages

pub mod format;

pub use format::OutputFormatHandler;
