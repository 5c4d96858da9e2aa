//! Maximizer API error detection and classification
//!
//! The Maximizer.Web.Data API answers HTTP 200 even when a call fails and
//! reports the outcome in the body's `Code` field. This module decides whether
//! such a soft failure means the access token needs refreshing, and rewrites
//! it into the 401 the host's refresh cycle understands.
//!
//! The decision is a case-insensitive search for "token" in the serialized
//! `Msg` field. Unrelated messages that happen to contain the word also
//! request a refresh.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::http::HttpResponse;

/// Pattern marking a soft failure as a token problem
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)token").expect("Invalid regex pattern for token error detection")
});

/// Status the host platform treats as "refresh the token and retry"
pub const REFRESH_STATUS: u16 = 401;

/// Authentication state at the host boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Requests are accepted
    Authenticated,
    /// The token was rejected; the host should refresh and retry once
    RefreshRequested,
}

impl AuthState {
    /// State implied by a (possibly rewritten) response status
    pub fn from_status(status: u16) -> Self {
        if status == REFRESH_STATUS {
            AuthState::RefreshRequested
        } else {
            AuthState::Authenticated
        }
    }
}

/// A non-zero `Code` together with its serialized `Msg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    /// The reported code; `None` when the body carries no usable `Code`
    pub code: Option<i64>,
    /// `Msg` serialized as JSON text, empty when absent
    pub message: String,
}

impl SoftFailure {
    /// Inspect a body expected to report `Code: 0`
    ///
    /// Returns `None` when the call succeeded. A missing `Code` counts as a failure.
    pub fn from_body(data: Option<&Value>) -> Option<Self> {
        let code = data.and_then(response_code);
        if code == Some(0) {
            return None;
        }
        Some(Self {
            code,
            message: data.map(serialized_message).unwrap_or_default(),
        })
    }

    /// True when the message points at the access token
    pub fn is_token_error(&self) -> bool {
        mentions_token(&self.message)
    }

    /// The message, or `fallback` when the server sent none
    pub fn message_or(&self, fallback: &str) -> String {
        if self.message.is_empty() {
            fallback.to_string()
        } else {
            self.message.clone()
        }
    }
}

/// Check whether a message mentions a token, ignoring case
pub fn mentions_token(message: &str) -> bool {
    TOKEN_PATTERN.is_match(message)
}

/// Read the `Code` field as an integer
///
/// Numeric strings are accepted; anything else is treated as absent.
pub fn response_code(data: &Value) -> Option<i64> {
    code_value(data.get("Code")?)
}

/// Interpret a `Code` value; numbers and numeric strings are accepted
pub fn code_value(code: &Value) -> Option<i64> {
    match code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The `Msg` field serialized as JSON text, or an empty string
pub fn serialized_message(data: &Value) -> String {
    match data.get("Msg") {
        None | Some(Value::Null) => String::new(),
        Some(msg) => msg.to_string(),
    }
}

/// After-response hook applied to every outbound call
///
/// - status 200 with a non-zero `Code` whose message mentions a token: status
///   becomes 401, body untouched
/// - status 200 with any other non-zero `Code`: `Application` error carrying the
///   serialized body
/// - anything else passes through unchanged
pub fn classify_response(mut response: HttpResponse) -> Result<HttpResponse> {
    if response.status != 200 {
        return Ok(response);
    }
    let Some(data) = response.data.as_ref() else {
        return Ok(response);
    };
    let Some(code) = response_code(data).filter(|code| *code != 0) else {
        return Ok(response);
    };

    if mentions_token(&serialized_message(data)) {
        warn!(code, "token rejected by Maximizer, requesting refresh");
        response.status = REFRESH_STATUS;
        return Ok(response);
    }

    Err(MaxbridgeError::Application(data.to_string()))
}
