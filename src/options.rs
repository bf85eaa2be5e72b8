use std::{fmt, sync::Arc};

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::{HeaderTransform, Hooks, LoggingFields};

/// Environment variable naming the deployment environment.
pub const DEPLOYMENT_ENV_VAR: &str = "DEPLOYMENT_ENV";
pub const TIMEOUT_MS_VAR: &str = "REST_CLIENT_TIMEOUT_MS";
pub const ACCEPT_ALL_STATUS_CODES_VAR: &str = "REST_CLIENT_ACCEPT_ALL_STATUS_CODES";

/// Certificate verification policy for HTTPS upstreams.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsPolicy {
    /// Reject invalid or self-signed certificates.
    Verify,
    /// Accept any certificate. Only meant for non-production environments.
    AcceptInvalidCerts,
}

impl TlsPolicy {
    /// Strict in `production`, relaxed in every other environment.
    pub fn for_environment(environment: Option<&str>) -> Self {
        match environment {
            Some(name) if name.trim().eq_ignore_ascii_case("production") => Self::Verify,
            _ => Self::AcceptInvalidCerts,
        }
    }

    /// Reads [`DEPLOYMENT_ENV_VAR`].
    pub fn from_env() -> Self {
        Self::for_environment(std::env::var(DEPLOYMENT_ENV_VAR).ok().as_deref())
    }
}

/// Client-wide configuration, set once through
/// [`RestClient::configure`](crate::RestClient::configure).
#[derive(Clone)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Largest response body accepted, in bytes.
    pub max_content_length: usize,
    pub tls: TlsPolicy,
    /// Return every response as a result instead of failing non-2xx/3xx ones.
    pub accept_all_status_codes: bool,
    pub hooks: Hooks,
    /// Extra headers merged into every outgoing attempt.
    pub transform_request_add_headers: Option<HeaderTransform>,
    /// Fixed delay before a connection-reset retry, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_content_length: 50_000_000,
            tls: TlsPolicy::Verify,
            accept_all_status_codes: false,
            hooks: Hooks::default(),
            transform_request_add_headers: None,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout_ms", &self.timeout_ms)
            .field("max_content_length", &self.max_content_length)
            .field("tls", &self.tls)
            .field("accept_all_status_codes", &self.accept_all_status_codes)
            .field("hooks", &self.hooks)
            .field(
                "transform_request_add_headers",
                &self.transform_request_add_headers.is_some(),
            )
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl ClientOptions {
    /// Defaults overridden by the process environment.
    ///
    /// Reads:
    /// - `DEPLOYMENT_ENV` for the TLS policy
    /// - `REST_CLIENT_TIMEOUT_MS` for the request timeout
    /// - `REST_CLIENT_ACCEPT_ALL_STATUS_CODES` (`true`/`false`)
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self {
            tls: TlsPolicy::for_environment(lookup(DEPLOYMENT_ENV_VAR).as_deref()),
            ..Self::default()
        };

        if let Some(timeout_ms) = lookup(TIMEOUT_MS_VAR).and_then(|v| v.trim().parse().ok()) {
            options.timeout_ms = timeout_ms;
        }
        if let Some(accept_all) =
            lookup(ACCEPT_ALL_STATUS_CODES_VAR).and_then(|v| v.trim().parse().ok())
        {
            options.accept_all_status_codes = accept_all;
        }
        options
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_accept_all_status_codes(mut self, accept_all: bool) -> Self {
        self.accept_all_status_codes = accept_all;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_content_length(mut self, max_content_length: usize) -> Self {
        self.max_content_length = max_content_length;
        self
    }

    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Sets the callback whose headers are added to every attempt, e.g. a
    /// fresh correlation id.
    pub fn with_request_headers(
        mut self,
        transform: impl Fn() -> HeaderMap + Send + Sync + 'static,
    ) -> Self {
        self.transform_request_add_headers = Some(Arc::new(transform));
        self
    }
}

/// Per-call options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    /// Copied into every hook context for the call.
    pub additional_logging_fields: LoggingFields,
    /// Headers for this call only, applied over the client defaults.
    pub headers: HeaderMap,
    /// Query string parameters.
    pub params: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logging_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_logging_fields
            .insert(key.into(), value.into());
        self
    }

    pub fn with_logging_fields(mut self, fields: LoggingFields) -> Self {
        self.additional_logging_fields = fields;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reqwest::header::HeaderMap;
    use serde_json::json;

    use super::{ClientOptions, RequestOptions, TlsPolicy};

    #[test]
    fn tls_is_verified_only_in_production() {
        assert_eq!(
            TlsPolicy::for_environment(Some("production")),
            TlsPolicy::Verify
        );
        assert_eq!(
            TlsPolicy::for_environment(Some(" Production ")),
            TlsPolicy::Verify
        );
        assert_eq!(
            TlsPolicy::for_environment(Some("test")),
            TlsPolicy::AcceptInvalidCerts
        );
        assert_eq!(TlsPolicy::for_environment(None), TlsPolicy::AcceptInvalidCerts);
    }

    #[test]
    fn from_lookup_applies_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEPLOYMENT_ENV", "production"),
            ("REST_CLIENT_TIMEOUT_MS", "1500"),
            ("REST_CLIENT_ACCEPT_ALL_STATUS_CODES", "true"),
        ]);
        let options = ClientOptions::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()));

        assert_eq!(options.tls, TlsPolicy::Verify);
        assert_eq!(options.timeout_ms, 1_500);
        assert!(options.accept_all_status_codes);
        assert_eq!(options.max_content_length, 50_000_000);
        assert_eq!(options.retry_backoff_ms, 500);
    }

    #[test]
    fn default_verifies_certificates() {
        let options = ClientOptions::default();

        assert_eq!(options.tls, TlsPolicy::Verify);
        assert_eq!(options.timeout_ms, 60_000);
        assert_eq!(options.max_content_length, 50_000_000);
        assert!(!options.accept_all_status_codes);
    }

    #[test]
    fn from_lookup_ignores_unparseable_values() {
        let options = ClientOptions::from_lookup(|key| match key {
            "REST_CLIENT_TIMEOUT_MS" => Some("soon".to_owned()),
            "REST_CLIENT_ACCEPT_ALL_STATUS_CODES" => Some("yes".to_owned()),
            _ => None,
        });

        assert_eq!(options.timeout_ms, 60_000);
        assert!(!options.accept_all_status_codes);
        assert_eq!(options.tls, TlsPolicy::AcceptInvalidCerts);
    }

    #[test]
    fn debug_hides_callbacks() {
        let options = ClientOptions::default().with_request_headers(HeaderMap::new);
        let debug = format!("{options:?}");

        assert!(debug.contains("transform_request_add_headers: true"));
    }

    #[test]
    fn request_options_collect_logging_fields() {
        let options = RequestOptions::new()
            .logging_field("gateway_account_id", 42)
            .logging_field("payment_external_id", "abc123")
            .param("page", "2");

        assert_eq!(options.additional_logging_fields["gateway_account_id"], json!(42));
        assert_eq!(
            options.additional_logging_fields["payment_external_id"],
            json!("abc123")
        );
        assert_eq!(options.params, vec![("page".to_owned(), "2".to_owned())]);
    }
}
