//! Maximizer API integration module
//!
//! This module provides all Maximizer-related functionality:
//! - OAuth2 authorization-code authentication with refresh
//! - Request signing and response classification hooks
//! - The Maximizer.Web.Data API client
//! - Custom record create, search and polling
//! - Connector registration records

pub mod auth;
pub mod client;
pub mod custom;
pub mod definition;
pub mod error_handler;
pub mod http;
pub mod session;

pub use auth::{
    authorize_url, connection_label, decorate_request, AuthorizationGrant, AuthorizationInput,
    Authenticator, Credentials, TokenPair,
};
pub use client::{ApiResult, MaximizerClient, Payload};
pub use custom::{CreateCustomParams, CustomHandler, CustomRecord, PolledRecord, SearchQuery};
pub use definition::ConnectorDefinition;
pub use error_handler::{classify_response, AuthState};
pub use http::{HttpResponse, OutboundRequest, RequestBody, ReqwestTransport, Transport};
pub use session::AuthenticatedSession;
