//! Request hooks around a transport
//!
//! Mirrors how the host platform runs every outbound call: the bearer token is
//! attached before sending, the response is classified after receiving, and a
//! 401 (real or rewritten) becomes a refresh request.

use async_trait::async_trait;

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::auth::{decorate_request, Credentials};
use crate::maximizer::error_handler::{classify_response, serialized_message, AuthState};
use crate::maximizer::http::{HttpResponse, OutboundRequest, Transport};

/// A [`Transport`] that signs requests and classifies responses
pub struct AuthenticatedSession<T> {
    inner: T,
    credentials: Credentials,
}

impl<T: Transport> AuthenticatedSession<T> {
    /// Wrap `inner` with the hooks for `credentials`
    pub fn new(inner: T, credentials: Credentials) -> Self {
        Self { inner, credentials }
    }

    /// Credentials used to sign requests
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[async_trait]
impl<T: Transport> Transport for AuthenticatedSession<T> {
    async fn execute(&self, request: OutboundRequest) -> Result<HttpResponse> {
        let request = decorate_request(request, &self.credentials);
        let response = classify_response(self.inner.execute(request).await?)?;

        match AuthState::from_status(response.status) {
            AuthState::Authenticated => Ok(response),
            AuthState::RefreshRequested => {
                let message = response
                    .data
                    .as_ref()
                    .map(serialized_message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                Err(MaxbridgeError::RefreshRequested(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maximizer::http::MockTransport;
    use secrecy::SecretString;
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            access_token: Some(SecretString::from("tok")),
            ..Credentials::new("url", "id", "secret")
        }
    }

    #[tokio::test]
    async fn test_session_signs_requests() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .times(1)
            .withf(|request| request.header_value("Authorization") == Some("Bearer tok"))
            .returning(|_| Ok(HttpResponse::json(200, json!({"Code": 0}))));

        let session = AuthenticatedSession::new(inner, credentials());
        let response = session.execute(OutboundRequest::post("url")).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_session_turns_token_failure_into_refresh_request() {
        let mut inner = MockTransport::new();
        inner.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::json(
                200,
                json!({"Code": -1, "Msg": ["Invalid token"]}),
            ))
        });

        let session = AuthenticatedSession::new(inner, credentials());
        let err = session
            .execute(OutboundRequest::post("url"))
            .await
            .unwrap_err();
        match err {
            MaxbridgeError::RefreshRequested(message) => {
                assert_eq!(message, r#"["Invalid token"]"#)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_treats_http_401_as_refresh_request() {
        let mut inner = MockTransport::new();
        inner
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "")));

        let session = AuthenticatedSession::new(inner, credentials());
        let err = session
            .execute(OutboundRequest::post("url"))
            .await
            .unwrap_err();
        assert!(err.is_refresh_requested());
    }

    #[tokio::test]
    async fn test_session_surfaces_application_errors() {
        let mut inner = MockTransport::new();
        inner.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::json(
                200,
                json!({"Code": -1, "Msg": ["An unknown error has occurred."]}),
            ))
        });

        let session = AuthenticatedSession::new(inner, credentials());
        let err = session
            .execute(OutboundRequest::post("url"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"{"Code":-1,"Msg":["An unknown error has occurred."]}"#
        );
    }
}
