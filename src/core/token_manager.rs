//! Token lifecycle management with refresh-and-retry
//!
//! Plays the host platform's part of the authentication protocol:
//! - every operation runs through an [`AuthenticatedSession`]
//! - a `RefreshRequested` failure triggers one refresh grant
//! - the operation is retried once with the refreshed credentials
//!
//! Refreshed credentials are handed to the persist hook as soon as the
//! refresh succeeds, before the retry runs.
//!
//! A second refresh request, or a failed refresh, is surfaced to the user.

use std::future::Future;

use tracing::{info, warn};

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::auth::{Authenticator, Credentials};
use crate::maximizer::http::Transport;
use crate::maximizer::session::AuthenticatedSession;

/// Result of an operation plus the credentials it finished with
#[derive(Debug)]
pub struct Authorized<R> {
    /// Operation output
    pub value: R,
    /// Credentials in effect after the operation
    pub credentials: Credentials,
    /// True when the tokens were refreshed during the operation
    pub refreshed: bool,
}

/// Stores credentials produced by a refresh
type PersistHook = Box<dyn Fn(&Credentials) -> Result<()> + Send + Sync>;

/// Runs operations with at most one refresh-and-retry cycle
pub struct TokenManager<T> {
    transport: T,
    persist: Option<PersistHook>,
}

impl<T: Transport + Clone> TokenManager<T> {
    /// Create a token manager sending through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            persist: None,
        }
    }

    /// Store refreshed credentials with `persist` right after each refresh
    pub fn with_persist<F>(mut self, persist: F) -> Self
    where
        F: Fn(&Credentials) -> Result<()> + Send + Sync + 'static,
    {
        self.persist = Some(Box::new(persist));
        self
    }

    /// Run `operation`, refreshing the token and retrying once if it asks for it
    pub async fn run<R, F, Fut>(
        &self,
        credentials: Credentials,
        operation: F,
    ) -> Result<Authorized<R>>
    where
        F: Fn(AuthenticatedSession<T>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let session = AuthenticatedSession::new(self.transport.clone(), credentials.clone());
        match operation(session).await {
            Ok(value) => Ok(Authorized {
                value,
                credentials,
                refreshed: false,
            }),
            Err(e) if e.is_refresh_requested() => {
                info!("access token rejected, refreshing");
                let credentials = self.refresh(credentials).await?;

                let session =
                    AuthenticatedSession::new(self.transport.clone(), credentials.clone());
                let value = operation(session).await.inspect_err(|e| {
                    if e.is_refresh_requested() {
                        warn!("refreshed token was rejected as well");
                    }
                })?;

                Ok(Authorized {
                    value,
                    credentials,
                    refreshed: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Perform the refresh grant, apply the new tokens and persist them
    ///
    /// Any grant failure means the session cannot be recovered without a new login.
    pub async fn refresh(&self, credentials: Credentials) -> Result<Credentials> {
        let credentials = self.refresh_grant(credentials).await?;
        if let Some(persist) = &self.persist {
            persist(&credentials)?;
        }
        Ok(credentials)
    }

    async fn refresh_grant(&self, credentials: Credentials) -> Result<Credentials> {
        let authenticator = Authenticator::new(self.transport.clone());
        match authenticator.refresh_token(&credentials).await {
            Ok(tokens) => Ok(credentials.with_tokens(tokens)),
            Err(MaxbridgeError::NotAuthenticated) => Err(MaxbridgeError::NotAuthenticated),
            Err(MaxbridgeError::TokenRefreshFailed(reason)) => {
                Err(MaxbridgeError::TokenRefreshFailed(reason))
            }
            Err(e) => Err(MaxbridgeError::TokenRefreshFailed(e.to_string())),
        }
    }
}
