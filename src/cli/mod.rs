//! Command-line interface for tunedrop.
//!
//! This module provides CLI commands for downloading, browsing the catalog,
//! inspecting history, and managing settings.

mod commands;

pub use commands::{Cli, Commands, run_command};
