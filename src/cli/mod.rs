//! CLI module for the rugcut binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod transport;

pub use main_impl::{main, Cli, CliApi, CliLogFormat, CliStrategy};
pub use transport::FsTransport;
