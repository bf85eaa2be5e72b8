//! Contexts handed to observer hooks.
//!
//! A [`RequestContext`] is built before every physical attempt. Once the
//! attempt completes, exactly one of [`ResponseContext`] or [`ErrorContext`]
//! is built and passed to the matching hook. All three serialize to JSON so
//! they can be logged as-is.

use std::time::Duration;

use reqwest::Method;
use serde::{Serialize, Serializer};

use crate::LoggingFields;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestContext {
    pub service: String,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub url: String,
    pub description: String,
    pub additional_logging_fields: LoggingFields,
    /// Number of retries already made for this call; 0 on the first attempt.
    #[serde(skip_serializing_if = "is_zero")]
    pub retry_count: u32,
}

/// Context for an attempt classified as successful.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseContext {
    pub service: String,
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub status: u16,
    pub url: String,
    pub description: String,
    pub additional_logging_fields: LoggingFields,
    /// The HTTP status rendered as a string.
    pub code: String,
    pub error_identifier: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Set when the call will be resubmitted after this attempt.
    pub retry: bool,
}

/// Context for an attempt classified as a failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorContext {
    pub service: String,
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub params: Vec<(String, String)>,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub url: String,
    pub description: String,
    pub additional_logging_fields: LoggingFields,
    /// Body `code`, else `ERR_BAD_REQUEST`/`ERR_BAD_RESPONSE` for HTTP
    /// failures, else the transport code (`ECONNRESET`, `ETIMEDOUT`, ...).
    pub code: Option<String>,
    pub message: String,
    pub reason: String,
    pub error_identifier: Option<String>,
    pub retry: bool,
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&method.as_str().to_ascii_lowercase())
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}
