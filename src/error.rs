//! Custom error types for maxbridge
//!
//! User-facing messages for every failure the connector can surface.

use thiserror::Error;

use crate::maximizer::error_handler::AuthState;

/// Main error type for the maxbridge connector
#[derive(Error, Debug)]
pub enum MaxbridgeError {
    /// Required user input is missing; raised before any network call
    #[error("{0}")]
    Validation(String),

    /// The API reported a soft failure that points at an expired or invalid token
    #[error("The Maximizer access token was rejected: {0}\n\n  → The token will be refreshed and the request retried.")]
    RefreshRequested(String),

    /// Any other non-zero `Code`, or a success response missing its payload
    #[error("{0}")]
    Application(String),

    /// No stored credentials
    #[error("You are not connected to Maximizer.\n\n  → Run 'mxb auth login' to connect.")]
    NotAuthenticated,

    /// Authorization-code exchange or connection test failed
    #[error("Maximizer authentication failed: {0}\n\n  → Check the server URL, client ID and client secret, then run 'mxb auth login' again.")]
    AuthenticationFailed(String),

    /// Refresh grant failed; the session cannot be recovered without a new login
    #[error("Failed to refresh the Maximizer token: {0}\n\n  → Run 'mxb auth login' to re-authenticate.")]
    TokenRefreshFailed(String),

    /// Credential storage error
    #[error("Cannot access secure storage: {0}\n\n  → On macOS: Make sure Keychain Access is available.\n  → On Linux: Ensure a secret service (like gnome-keyring) is running.")]
    Credential(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Network request error
    #[error("Network request failed: {0}\n\n  → Check your internet connection and the Maximizer URL.")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// Operation cancelled by user
    #[error("Operation cancelled.")]
    Cancelled,
}

impl MaxbridgeError {
    /// True when the host should refresh the token and retry the operation once
    pub fn is_refresh_requested(&self) -> bool {
        matches!(self, MaxbridgeError::RefreshRequested(_))
    }

    /// Authentication state implied by this error
    pub fn auth_state(&self) -> AuthState {
        if self.is_refresh_requested() {
            AuthState::RefreshRequested
        } else {
            AuthState::Authenticated
        }
    }
}

impl From<keyring::Error> for MaxbridgeError {
    fn from(err: keyring::Error) -> Self {
        MaxbridgeError::Credential(err.to_string())
    }
}

impl From<toml::de::Error> for MaxbridgeError {
    fn from(err: toml::de::Error) -> Self {
        MaxbridgeError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for MaxbridgeError {
    fn from(err: toml::ser::Error) -> Self {
        MaxbridgeError::Toml(err.to_string())
    }
}

impl From<url::ParseError> for MaxbridgeError {
    fn from(err: url::ParseError) -> Self {
        MaxbridgeError::Config(format!("Invalid Maximizer URL: {}", err))
    }
}

/// Result type alias using MaxbridgeError
pub type Result<T> = std::result::Result<T, MaxbridgeError>;
