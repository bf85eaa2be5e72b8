//! `pay-rest-client` is a resilient async REST client for calls between
//! platform services.
//!
//! A [`RestClient`] wraps a pooled `reqwest` client and adds:
//! - observer [`Hooks`] around every physical attempt
//! - up to two retries for GET requests that fail with `ECONNRESET`
//! - a single normalized error type, [`RestClientError`]

mod client;
mod context;
mod error;
mod hooks;
#[cfg(feature = "tracing")]
mod logging;
mod options;
mod response;
mod wire;

pub use client::RestClient;
pub use context::{ErrorContext, RequestContext, ResponseContext};
pub use error::{ConfigError, RestClientError};
pub use hooks::{HeaderTransform, Hook, Hooks};
pub use options::{
    ClientOptions, RequestOptions, TlsPolicy, ACCEPT_ALL_STATUS_CODES_VAR, DEPLOYMENT_ENV_VAR,
    TIMEOUT_MS_VAR,
};
pub use response::RestResponse;

/// Caller-supplied structured fields copied into every hook context.
pub type LoggingFields = serde_json::Map<String, serde_json::Value>;

pub type Result<T> = std::result::Result<T, RestClientError>;
