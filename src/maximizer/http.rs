//! HTTP transport seam
//!
//! Every call the connector makes is expressed as an [`OutboundRequest`] and
//! answered with an [`HttpResponse`]. The [`Transport`] trait is the only place
//! that touches the network, so hooks can wrap it and tests can replace it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Request timeout applied by [`ReqwestTransport::new`]
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Wire body of an outbound request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Text sent as-is (already-encoded JSON included)
    Text(String),
    /// Raw bytes sent as-is
    Bytes(Vec<u8>),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
}

/// A single outbound HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// Absolute URL
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Header name to value
    pub headers: BTreeMap<String, String>,
    /// Request body
    pub body: RequestBody,
}

impl OutboundRequest {
    /// Start a POST request to `url`
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Builder-style header setter (see [`OutboundRequest::set_header`])
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Replace all headers
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set a header, replacing any existing header with the same name in any case
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response text
    pub content: String,
    /// Parsed JSON body, when the content is JSON
    pub data: Option<Value>,
}

impl HttpResponse {
    /// Build a response from raw text, parsing it as JSON when possible
    pub fn new(status: u16, content: impl Into<String>) -> Self {
        let content = content.into();
        let data = if content.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&content).ok()
        };
        Self {
            status,
            content,
            data,
        }
    }

    /// Build a response from a JSON value
    pub fn json(status: u16, data: Value) -> Self {
        Self {
            status,
            content: data.to_string(),
            data: Some(data),
        }
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body into `T`
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// Sends one request and returns one response
///
/// Implementations must not retry; retry orchestration belongs to the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a single request
    async fn execute(&self, request: OutboundRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: OutboundRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the default request timeout
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Form(fields) => builder.form(&fields),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content = response.text().await?;

        debug!(status, "received response");
        Ok(HttpResponse::new(status, content))
    }
}
