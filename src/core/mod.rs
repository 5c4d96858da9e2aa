//! Host-side functionality for maxbridge
//!
//! This module plays the host platform's part:
//! - Credential management
//! - Token lifecycle management
//! - Application configuration

pub mod config;
pub mod credentials;
pub mod token_manager;

pub use config::Config;
pub use credentials::CredentialStore;
pub use token_manager::{Authorized, TokenManager};
