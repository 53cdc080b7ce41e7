//! Fantasy Scoring Service Library
//!
//! Configuration loading, logging setup and the command-line surface for the
//! `fantasy-scoring` binary.

use anyhow::{Context, Result};
use std::path::Path;

pub mod cli;
pub mod config;
pub mod logging;

pub use crate::cli::{Cli, Commands};
pub use crate::config::{LoggingConfig, ServiceConfig};
pub use crate::logging::initialize_logging;

/// Load configuration from an optional file and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    crate::config::load_config(path).context("Failed to load service configuration")
}
