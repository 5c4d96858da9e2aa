//! CLI module for maxbridge
//!
//! This module contains all CLI command definitions and handlers using clap.

pub mod commands;
pub mod auth;
pub mod custom;
pub mod config;

pub use commands::{Cli, Commands};

use crate::error::Result;
use crate::maximizer::definition::ConnectorDefinition;

/// Print the connector definition as JSON
pub fn handle_describe() -> Result<()> {
    let definition = ConnectorDefinition::maximizer();
    println!("{}", serde_json::to_string_pretty(&definition)?);
    Ok(())
}
