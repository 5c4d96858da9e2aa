//! OAuth2 authorization-code authentication for Maximizer
//!
//! Implements the authorization-code grant with refresh against the
//! `MaximizerWebAuthentication` service, the bearer-token request hook, and
//! the connection test used when an account is first connected.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::client::data_api_base;
use crate::maximizer::error_handler::SoftFailure;
use crate::maximizer::http::{HttpResponse, OutboundRequest, RequestBody, Transport};

/// OAuth2 authorize endpoint, relative to the server base
const AUTHORIZE_PATH: &str = "MaximizerWebAuthentication/OAuth2/Authorize";

/// OAuth2 token endpoint, relative to the server base
const TOKEN_PATH: &str = "MaximizerWebAuthentication/OAuth2/Token";

/// Connection test endpoint, relative to the data API base
const SESSION_INFO_ENDPOINT: &str = "GetSessionInfo";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const VERIFY_FALLBACK_MESSAGE: &str = "Unable to verify authentication status.";

/// Minimal session fields requested by the connection test
const SESSION_INFO_REQUEST: &str = r#"{"User":{"DisplayName":1},"AddressBook":{"DisplayValue":1}}"#;

/// Credentials for one connected Maximizer account
///
/// Owned by the host's credential store. The connector only reads them and,
/// on refresh, returns a new token pair for the host to persist.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Server base URL, e.g. `https://crm.example.com`
    pub base_url: String,
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: SecretString,
    /// Redirect URI registered with the OAuth2 app profile
    pub redirect_uri: Option<String>,
    /// Current access token
    pub access_token: Option<SecretString>,
    /// Current refresh token
    pub refresh_token: Option<SecretString>,
}

impl Credentials {
    /// Credentials without tokens
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: None,
            access_token: None,
            refresh_token: None,
        }
    }

    /// Set the redirect URI
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Apply a token pair returned by a grant
    ///
    /// A missing refresh token keeps the stored one.
    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.access_token = Some(tokens.access_token);
        if let Some(refresh_token) = tokens.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self
    }

    /// Non-empty access token, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .filter(|token| !token.is_empty())
    }

    /// Convert to storable format for keyring persistence
    pub fn to_stored(&self) -> StoredCredentials {
        StoredCredentials {
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.expose_secret().to_string(),
            redirect_uri: self.redirect_uri.clone(),
            access_token: self
                .access_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            version: 1,
        }
    }

    /// Create from stored format after keyring retrieval
    pub fn from_stored(stored: StoredCredentials) -> Self {
        Self {
            base_url: stored.base_url,
            client_id: stored.client_id,
            client_secret: SecretString::from(stored.client_secret),
            redirect_uri: stored.redirect_uri,
            access_token: stored.access_token.map(SecretString::from),
            refresh_token: stored.refresh_token.map(SecretString::from),
        }
    }
}

/// Serializable format for keyring storage
///
/// Uses plain strings since SecretString doesn't implement Serialize.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Version for future migrations
    pub version: u8,
}

/// Tokens returned by the token endpoint
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    /// Absent when the server keeps the previous refresh token
    pub refresh_token: Option<SecretString>,
}

/// Token response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// OAuth2 error body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Authorization-code exchange parameters as supplied at request time
///
/// Each value falls back to the stored one when absent or empty.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationInput {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
}

impl AuthorizationInput {
    /// Fill missing values from `fallback`
    pub fn with_fallback(self, fallback: AuthorizationInput) -> Self {
        Self {
            base_url: first_present(self.base_url, fallback.base_url),
            client_id: first_present(self.client_id, fallback.client_id),
            client_secret: match self.client_secret {
                Some(secret) if !secret.expose_secret().is_empty() => Some(secret),
                _ => fallback.client_secret,
            },
            code: first_present(self.code, fallback.code),
            redirect_uri: first_present(self.redirect_uri, fallback.redirect_uri),
        }
    }

    /// Check that every parameter is present and non-empty
    pub fn resolve(self) -> Result<AuthorizationGrant> {
        let client_secret = self
            .client_secret
            .filter(|secret| !secret.expose_secret().is_empty())
            .ok_or_else(|| missing_parameter("client secret"))?;

        Ok(AuthorizationGrant {
            base_url: require(self.base_url, "Maximizer URL")?,
            client_id: require(self.client_id, "client ID")?,
            client_secret,
            code: require(self.code, "authorization code")?,
            redirect_uri: require(self.redirect_uri, "redirect URI")?,
        })
    }
}

impl From<&Credentials> for AuthorizationInput {
    fn from(credentials: &Credentials) -> Self {
        Self {
            base_url: Some(credentials.base_url.clone()),
            client_id: Some(credentials.client_id.clone()),
            client_secret: Some(credentials.client_secret.clone()),
            code: None,
            redirect_uri: credentials.redirect_uri.clone(),
        }
    }
}

/// Fully resolved authorization-code exchange
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub code: String,
    pub redirect_uri: String,
}

impl AuthorizationGrant {
    /// Credentials for this grant once tokens have been issued
    pub fn into_credentials(self, tokens: TokenPair) -> Credentials {
        Credentials {
            base_url: self.base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: Some(self.redirect_uri),
            access_token: None,
            refresh_token: None,
        }
        .with_tokens(tokens)
    }
}

fn first_present(value: Option<String>, fallback: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).or(fallback)
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing_parameter(name))
}

fn missing_parameter(name: &str) -> MaxbridgeError {
    MaxbridgeError::Validation(format!("The {} is required to connect to Maximizer.", name))
}

/// Join a server base and a path with exactly one separator
fn server_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Token endpoint URL for a server base
pub fn token_url(base_url: &str) -> String {
    server_url(base_url, TOKEN_PATH)
}

/// Build the browser authorization URL for the authorization-code grant
pub fn authorize_url(
    base_url: &str,
    client_id: &str,
    state: &str,
    redirect_uri: &str,
) -> Result<Url> {
    let url = Url::parse_with_params(
        &server_url(base_url, AUTHORIZE_PATH),
        &[
            ("client_id", client_id),
            ("state", state),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
        ],
    )?;
    Ok(url)
}

/// Before-request hook: attach the bearer token
///
/// Overwrites any existing Authorization header. Without a non-empty access
/// token the request is returned unchanged.
pub fn decorate_request(mut request: OutboundRequest, credentials: &Credentials) -> OutboundRequest {
    if let Some(token) = credentials.bearer_token() {
        request.set_header("Authorization", format!("Bearer {}", token));
    }
    request
}

/// Human-readable account label from a successful connection test
///
/// Renders `"{AddressBook} - {User}"`; missing parts render empty.
pub fn connection_label(response: &HttpResponse) -> String {
    let field = |section: &str, name: &str| {
        response
            .data
            .as_ref()
            .and_then(|data| data.pointer(&format!("/Data/{}/{}", section, name)))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    format!(
        "{} - {}",
        field("AddressBook", "DisplayValue"),
        field("User", "DisplayName")
    )
}

/// OAuth2 authentication handler
pub struct Authenticator<T> {
    transport: T,
}

impl<T: Transport> Authenticator<T> {
    /// Create an authenticator sending through `transport`
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Exchange an authorization code for tokens
    #[instrument(level = "debug", skip_all, fields(base_url = %grant.base_url))]
    pub async fn acquire_token(&self, grant: &AuthorizationGrant) -> Result<TokenPair> {
        let fields = vec![
            ("client_id".to_string(), grant.client_id.clone()),
            (
                "client_secret".to_string(),
                grant.client_secret.expose_secret().to_string(),
            ),
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), grant.code.clone()),
            ("redirect_uri".to_string(), grant.redirect_uri.clone()),
        ];

        let response = self.token_request(&grant.base_url, fields).await?;
        if !response.is_success() {
            return Err(MaxbridgeError::AuthenticationFailed(oauth_error(&response)));
        }
        parse_tokens(&response)
    }

    /// Exchange the stored refresh token for a new token pair
    ///
    /// Uses only stored credentials, never fresh user input.
    #[instrument(level = "debug", skip_all, fields(base_url = %credentials.base_url))]
    pub async fn refresh_token(&self, credentials: &Credentials) -> Result<TokenPair> {
        let refresh_token = credentials
            .refresh_token
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(MaxbridgeError::NotAuthenticated)?;

        let mut fields = vec![
            ("client_id".to_string(), credentials.client_id.clone()),
            (
                "client_secret".to_string(),
                credentials.client_secret.expose_secret().to_string(),
            ),
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token),
        ];
        if let Some(redirect_uri) = &credentials.redirect_uri {
            fields.push(("redirect_uri".to_string(), redirect_uri.clone()));
        }

        let response = self.token_request(&credentials.base_url, fields).await?;
        if !response.is_success() {
            return Err(MaxbridgeError::TokenRefreshFailed(oauth_error(&response)));
        }
        parse_tokens(&response)
    }

    /// Test the connection with a minimal `GetSessionInfo` call
    ///
    /// Returns the raw response so the caller can build a [`connection_label`].
    #[instrument(level = "debug", skip(self))]
    pub async fn verify_connection(&self, base_url: &str) -> Result<HttpResponse> {
        let request = OutboundRequest::post(format!(
            "{}/{}",
            data_api_base(base_url),
            SESSION_INFO_ENDPOINT
        ))
        .body(RequestBody::Text(SESSION_INFO_REQUEST.to_string()));

        let response = self.transport.execute(request).await?;
        let Some(failure) = SoftFailure::from_body(response.data.as_ref()) else {
            return Ok(response);
        };

        if failure.is_token_error() {
            warn!("connection test rejected the access token");
            return Err(MaxbridgeError::RefreshRequested(failure.message));
        }
        Err(MaxbridgeError::AuthenticationFailed(
            failure.message_or(VERIFY_FALLBACK_MESSAGE),
        ))
    }

    async fn token_request(
        &self,
        base_url: &str,
        fields: Vec<(String, String)>,
    ) -> Result<HttpResponse> {
        let request = OutboundRequest::post(token_url(base_url))
            .header("content-type", FORM_CONTENT_TYPE)
            .body(RequestBody::Form(fields));

        let response = self.transport.execute(request).await?;
        debug!(status = response.status, "token endpoint responded");
        Ok(response)
    }
}

fn parse_tokens(response: &HttpResponse) -> Result<TokenPair> {
    let tokens: TokenResponse = response.parse()?;
    Ok(TokenPair {
        access_token: SecretString::from(tokens.access_token),
        refresh_token: tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from),
    })
}

fn oauth_error(response: &HttpResponse) -> String {
    match response.parse::<ErrorResponse>() {
        Ok(ErrorResponse {
            error,
            error_description: Some(description),
        }) => format!("{} ({})", error, description),
        Ok(ErrorResponse { error, .. }) => error,
        Err(_) if response.content.trim().is_empty() => format!("HTTP {}", response.status),
        Err(_) => format!("HTTP {}: {}", response.status, response.content),
    }
}
