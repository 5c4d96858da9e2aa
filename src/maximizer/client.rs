//! Maximizer.Web.Data API client
//!
//! Single choke point for every non-authentication call. Sends one POST per
//! operation and turns the API's in-body `Code` into a result or an error.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::error_handler::{code_value, SoftFailure};
use crate::maximizer::http::{OutboundRequest, RequestBody, Transport};

/// Data API path, relative to the server base
pub const DATA_API_PATH: &str = "MaximizerWebData/Data.svc/json";

const GENERIC_FAILURE_MESSAGE: &str = "The Maximizer.Web.Data API request failed.";

/// Data API base URL for a server base, with exactly one separator before the path
pub fn data_api_base(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), DATA_API_PATH)
}

/// Deserialized body of a Data API response
///
/// `Code` 0 means the resource payloads (keyed by resource name) can be read;
/// any other value means `Msg` explains the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    #[serde(rename = "Code", deserialize_with = "lenient_code")]
    pub code: i64,
    #[serde(rename = "Msg", default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<Vec<String>>,
    /// Resource payloads such as `Custom`, plus any other top-level fields
    #[serde(flatten)]
    pub resources: Map<String, Value>,
}

/// `Code` as a number or a numeric string, the same rule the soft-failure check uses
fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    code_value(&value).ok_or_else(|| D::Error::custom(format!("invalid Code: {}", value)))
}

impl ApiResult {
    /// Raw `Data` of a resource payload; `None` when absent or null
    pub fn data(&self, resource: &str) -> Option<&Value> {
        self.resources
            .get(resource)
            .and_then(|payload| payload.get("Data"))
            .filter(|data| !data.is_null())
    }

    /// `Data` of a resource payload as a single object
    pub fn record<T: DeserializeOwned>(&self, resource: &str) -> Result<Option<T>> {
        self.data(resource)
            .map(|data| T::deserialize(data).map_err(MaxbridgeError::from))
            .transpose()
    }

    /// `Data` of a resource payload as a list; a single object becomes a one-item list
    pub fn records<T: DeserializeOwned>(&self, resource: &str) -> Result<Option<Vec<T>>> {
        let Some(data) = self.data(resource) else {
            return Ok(None);
        };
        let records = match data {
            Value::Array(_) => Vec::<T>::deserialize(data)?,
            _ => vec![T::deserialize(data)?],
        };
        Ok(Some(records))
    }
}

/// Request body handed to [`MaximizerClient::send`]
///
/// Text and bytes are sent unchanged; JSON values are encoded exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl Payload {
    /// Encode a serializable request as a JSON payload
    pub fn json<S: Serialize>(request: &S) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(request)?))
    }

    fn into_body(self) -> Result<RequestBody> {
        Ok(match self {
            Payload::Text(text) => RequestBody::Text(text),
            Payload::Bytes(bytes) => RequestBody::Bytes(bytes),
            Payload::Json(value) => RequestBody::Text(serde_json::to_string(&value)?),
        })
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Maximizer.Web.Data API client
pub struct MaximizerClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> MaximizerClient<T> {
    /// Create a client for the server at `maximizer_url`
    pub fn new(transport: T, maximizer_url: &str) -> Self {
        Self {
            transport,
            base_url: data_api_base(maximizer_url),
        }
    }

    /// Data API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request to a Data API endpoint such as `Create` or `Read`
    ///
    /// Without `headers`, `Content-Type: application/json` is sent. Never retries:
    /// a token failure surfaces as `RefreshRequested` for the host to handle.
    #[instrument(level = "debug", skip(self, payload, headers))]
    pub async fn send(
        &self,
        endpoint: &str,
        payload: impl Into<Payload> + Send,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<ApiResult> {
        let headers = headers.unwrap_or_else(|| {
            BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
        });
        let request = OutboundRequest::post(format!("{}/{}", self.base_url, endpoint))
            .headers(headers)
            .body(payload.into().into_body()?);

        let response = self.transport.execute(request).await?;
        let Some(failure) = SoftFailure::from_body(response.data.as_ref()) else {
            debug!("request succeeded");
            return response.parse();
        };

        warn!(code = ?failure.code, message = %failure.message, "Maximizer API request failed");
        if failure.is_token_error() {
            warn!("authentication error, requesting token refresh");
            return Err(MaxbridgeError::RefreshRequested(failure.message));
        }
        Err(MaxbridgeError::Application(
            failure.message_or(GENERIC_FAILURE_MESSAGE),
        ))
    }
}
