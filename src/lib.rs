//! maxbridge - A Maximizer CRM connector
//!
//! This library implements the connector: OAuth2 authorization-code
//! authentication with refresh, request and response hooks that turn the
//! API's soft token failures into refresh requests, and create, search and
//! polling operations for Custom records. The `mxb` binary hosts it locally.

pub mod cli;
pub mod core;
pub mod error;
pub mod maximizer;

pub use error::{MaxbridgeError, Result};
