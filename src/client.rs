use std::{
    error::Error as _,
    fmt, io,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, StatusCode,
};
use serde::Serialize;
use tokio::time::sleep;

use crate::{
    wire::{ErrorBody, ECONNRESET, UNKNOWN_REASON},
    ClientOptions, ConfigError, ErrorContext, RequestContext, RequestOptions, ResponseContext,
    RestClientError, RestResponse, Result, TlsPolicy,
};

/// Retries allowed after the first attempt of a GET that hit a connection reset.
const MAX_CONNECTION_RESET_RETRIES: u32 = 2;

const NOT_CONFIGURED: &str = "client is not configured";
const ERR_CONTENT_LENGTH_EXCEEDED: &str = "ERR_CONTENT_LENGTH_EXCEEDED";
const ERR_BAD_REQUEST: &str = "ERR_BAD_REQUEST";
const ERR_BAD_RESPONSE: &str = "ERR_BAD_RESPONSE";

/// REST client for one upstream service.
///
/// Every call runs request/response hooks, retries GETs that fail with a
/// connection reset, and reports failures as a [`RestClientError`].
///
/// ```no_run
/// use pay_rest_client::{ClientOptions, RequestOptions, RestClient};
///
/// # async fn run() -> anyhow::Result<()> {
/// let client = RestClient::new("frontend")
///     .with_configuration("http://connector:9300", ClientOptions::default())?;
///
/// let charge = client
///     .get(
///         "/v1/frontend/charges/abc123",
///         "fetch charge",
///         RequestOptions::new().logging_field("payment_external_id", "abc123"),
///     )
///     .await?;
/// println!("{}", charge.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestClient {
    app: String,
    transport: Option<Arc<Transport>>,
}

struct Transport {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

/// One logical call, resubmitted unchanged on every retry.
struct Call<'a> {
    method: Method,
    path: &'a str,
    body: Option<Vec<u8>>,
    description: &'a str,
    options: RequestOptions,
}

enum Attempt {
    Success {
        response: RestResponse,
        ctx: ResponseContext,
        retry_code: Option<String>,
    },
    Failure {
        ctx: ErrorContext,
        retry_code: Option<String>,
    },
}

/// No usable response was received.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
struct TransportFailure {
    code: Option<String>,
    detail: String,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("RestClient");
        debug.field("app", &self.app);
        if let Some(transport) = &self.transport {
            debug
                .field("base_url", &transport.base_url)
                .field("options", &transport.options);
        }
        debug.finish()
    }
}

impl RestClient {
    /// Creates an unconfigured client; `app` tags every hook context and error.
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            transport: None,
        }
    }

    /// Configures the base URL and client-wide options.
    ///
    /// Meant to be called once. Calling it again replaces the previous
    /// configuration for this handle; existing clones keep the old one.
    pub fn configure(
        &mut self,
        base_url: impl AsRef<str>,
        options: ClientOptions,
    ) -> std::result::Result<(), ConfigError> {
        let base_url = base_url.as_ref().trim();
        let parsed = url::Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_owned(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                scheme: parsed.scheme().to_owned(),
            });
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_millis(options.timeout_ms))
            .danger_accept_invalid_certs(options.tls == TlsPolicy::AcceptInvalidCerts)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        self.transport = Some(Arc::new(Transport {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            options,
        }));
        Ok(())
    }

    /// Chaining form of [`RestClient::configure`].
    pub fn with_configuration(
        mut self,
        base_url: impl AsRef<str>,
        options: ClientOptions,
    ) -> std::result::Result<Self, ConfigError> {
        self.configure(base_url, options)?;
        Ok(self)
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    /// The configured base URL, without trailing slash.
    pub fn base_url(&self) -> Option<&str> {
        self.transport
            .as_deref()
            .map(|transport| transport.base_url.as_str())
    }

    pub async fn get(
        &self,
        path: &str,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        self.dispatch(Method::GET, path, None, description, options)
            .await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        let body = self.encode_payload(payload)?;
        self.dispatch(Method::POST, path, Some(body), description, options)
            .await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        let body = self.encode_payload(payload)?;
        self.dispatch(Method::PUT, path, Some(body), description, options)
            .await
    }

    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        let body = self.encode_payload(payload)?;
        self.dispatch(Method::PATCH, path, Some(body), description, options)
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        self.dispatch(Method::DELETE, path, None, description, options)
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        description: &str,
        options: RequestOptions,
    ) -> Result<RestResponse> {
        let transport = self
            .transport
            .as_deref()
            .ok_or_else(|| self.local_error(NOT_CONFIGURED.to_owned()))?;
        let hooks = &transport.options.hooks;
        let call = Call {
            method,
            path,
            body,
            description,
            options,
        };

        let mut retry_count = 0u32;
        loop {
            match transport.attempt(&self.app, &call, retry_count).await {
                Attempt::Success {
                    response,
                    mut ctx,
                    retry_code,
                } => {
                    if should_retry(&call.method, retry_code.as_deref(), retry_count) {
                        ctx.retry = true;
                        hooks.success_response(&ctx);
                        retry_count += 1;
                        transport.wait_before_retry(&call, retry_count).await;
                        continue;
                    }

                    hooks.success_response(&ctx);
                    return Ok(response);
                }
                Attempt::Failure {
                    mut ctx,
                    retry_code,
                } => {
                    if should_retry(&call.method, retry_code.as_deref(), retry_count) {
                        ctx.retry = true;
                        hooks.failure_response(&ctx);
                        retry_count += 1;
                        transport.wait_before_retry(&call, retry_count).await;
                        continue;
                    }

                    hooks.failure_response(&ctx);
                    return Err(RestClientError {
                        message: ctx.message,
                        service: ctx.service,
                        error_code: ctx.status,
                        error_identifier: ctx.error_identifier,
                        reason: ctx.reason,
                    });
                }
            }
        }
    }

    fn encode_payload<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(payload)
            .map_err(|err| self.local_error(format!("failed to encode request payload: {err}")))
    }

    /// Error raised before any attempt is made; no hooks fire for it.
    fn local_error(&self, message: String) -> RestClientError {
        RestClientError {
            message,
            service: self.app.clone(),
            error_code: None,
            error_identifier: None,
            reason: UNKNOWN_REASON.to_owned(),
        }
    }
}

impl Transport {
    async fn attempt(&self, app: &str, call: &Call<'_>, retry_count: u32) -> Attempt {
        let request_ctx = RequestContext {
            service: app.to_owned(),
            method: call.method.clone(),
            url: call.path.to_owned(),
            description: call.description.to_owned(),
            additional_logging_fields: call.options.additional_logging_fields.clone(),
            retry_count,
        };
        self.options.hooks.request_start(&request_ctx);

        let mut request = self
            .http
            .request(call.method.clone(), join_url(&self.base_url, call.path))
            .headers(call.options.headers.clone());
        if let Some(transform) = &self.options.transform_request_add_headers {
            request = request.headers(transform());
        }
        if !call.options.params.is_empty() {
            request = request.query(&call.options.params);
        }
        if let Some(body) = &call.body {
            request = request.body(body.clone());
        }

        let started = Instant::now();
        let outcome = match request.send().await {
            Ok(response) => self.read_response(response).await,
            Err(err) => Err(TransportFailure::from(err)),
        };
        let response_time = started.elapsed();

        match outcome {
            Ok(response) => self.classify(
                request_ctx,
                call.options.params.clone(),
                response,
                response_time,
            ),
            Err(failure) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    service = app,
                    method = %call.method,
                    url = call.path,
                    code = failure.code.as_deref(),
                    "transport failure: {}",
                    failure.detail
                );

                let body = ErrorBody::default();
                let ctx = ErrorContext {
                    service: request_ctx.service,
                    response_time,
                    method: request_ctx.method,
                    params: call.options.params.clone(),
                    status: None,
                    url: request_ctx.url,
                    description: request_ctx.description,
                    additional_logging_fields: request_ctx.additional_logging_fields,
                    code: failure.code.clone(),
                    message: body.failure_message(),
                    reason: body.failure_reason(),
                    error_identifier: None,
                    retry: false,
                };
                Attempt::Failure {
                    ctx,
                    retry_code: failure.code,
                }
            }
        }
    }

    fn classify(
        &self,
        request_ctx: RequestContext,
        params: Vec<(String, String)>,
        response: RestResponse,
        response_time: Duration,
    ) -> Attempt {
        let status = response.status();
        let body = ErrorBody::from_json(response.data());

        if self.options.accept_all_status_codes || is_success_status(status) {
            let ctx = ResponseContext {
                service: request_ctx.service,
                response_time,
                method: request_ctx.method,
                params,
                status: status.as_u16(),
                url: request_ctx.url,
                description: request_ctx.description,
                additional_logging_fields: request_ctx.additional_logging_fields,
                code: status.as_u16().to_string(),
                error_identifier: body.error_identifier,
                reason: body.reason,
                message: body.message,
                retry: false,
            };
            return Attempt::Success {
                response,
                ctx,
                retry_code: body.code,
            };
        }

        let ctx = ErrorContext {
            service: request_ctx.service,
            response_time,
            method: request_ctx.method,
            params,
            status: Some(status.as_u16()),
            url: request_ctx.url,
            description: request_ctx.description,
            additional_logging_fields: request_ctx.additional_logging_fields,
            code: body
                .code
                .clone()
                .or_else(|| Some(http_failure_code(status).to_owned())),
            message: body.failure_message(),
            reason: body.failure_reason(),
            error_identifier: body.error_identifier,
            retry: false,
        };
        Attempt::Failure {
            ctx,
            retry_code: body.code,
        }
    }

    async fn read_response(
        &self,
        mut response: reqwest::Response,
    ) -> std::result::Result<RestResponse, TransportFailure> {
        let limit = self.options.max_content_length;
        let status = response.status();
        let headers = response.headers().clone();

        if response
            .content_length()
            .is_some_and(|length| length > limit as u64)
        {
            return Err(TransportFailure::content_length_exceeded(limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(TransportFailure::from)? {
            if body.len() + chunk.len() > limit {
                return Err(TransportFailure::content_length_exceeded(limit));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RestResponse::new(status, headers, body))
    }

    /// Waits the fixed backoff before resubmitting a call.
    async fn wait_before_retry(&self, call: &Call<'_>, retry_count: u32) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %call.method,
            url = call.path,
            retry_count,
            "connection reset, retrying after {} ms",
            self.options.retry_backoff_ms
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (call, retry_count);

        sleep(Duration::from_millis(self.options.retry_backoff_ms)).await;
    }
}

impl TransportFailure {
    fn content_length_exceeded(limit: usize) -> Self {
        Self {
            code: Some(ERR_CONTENT_LENGTH_EXCEEDED.to_owned()),
            detail: format!("response body exceeds maximum content length of {limit} bytes"),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        Self {
            code: transport_code(&err).map(str::to_owned),
            detail: err.to_string(),
        }
    }
}

fn should_retry(method: &Method, code: Option<&str>, retry_count: u32) -> bool {
    *method == Method::GET
        && code == Some(ECONNRESET)
        && retry_count < MAX_CONNECTION_RESET_RETRIES
}

fn is_success_status(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

fn http_failure_code(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        ERR_BAD_REQUEST
    } else {
        ERR_BAD_RESPONSE
    }
}

/// Maps a transport error to the conventional socket error code, if any.
fn transport_code(err: &reqwest::Error) -> Option<&'static str> {
    if err.is_timeout() {
        return Some("ETIMEDOUT");
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return io_error_code(io_err.kind());
        }
        source = inner.source();
    }
    None
}

fn io_error_code(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::ConnectionReset => Some(ECONNRESET),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::NotConnected => Some("ENOTCONN"),
        io::ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
        _ => None,
    }
}

/// Joins a path onto the base URL. Absolute URLs are used as-is.
fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    if path.is_empty() {
        return base_url.to_owned();
    }
    format!("{}/{}", base_url, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::io;

    use reqwest::{Method, StatusCode};

    use super::{http_failure_code, io_error_code, join_url, should_retry, RestClient};
    use crate::{ClientOptions, ConfigError, RequestOptions};

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("http://localhost:8000", "/v1/charges"),
            "http://localhost:8000/v1/charges"
        );
        assert_eq!(
            join_url("http://localhost:8000", "v1/charges"),
            "http://localhost:8000/v1/charges"
        );
        assert_eq!(join_url("http://localhost:8000", "/"), "http://localhost:8000/");
        assert_eq!(join_url("http://localhost:8000", ""), "http://localhost:8000");
        assert_eq!(
            join_url("http://localhost:8000", "https://other/v1"),
            "https://other/v1"
        );
    }

    #[test]
    fn only_gets_with_connection_reset_are_retried() {
        assert!(should_retry(&Method::GET, Some("ECONNRESET"), 0));
        assert!(should_retry(&Method::GET, Some("ECONNRESET"), 1));
        assert!(!should_retry(&Method::GET, Some("ECONNRESET"), 2));
        assert!(!should_retry(&Method::POST, Some("ECONNRESET"), 0));
        assert!(!should_retry(&Method::GET, Some("a code"), 0));
        assert!(!should_retry(&Method::GET, None, 0));
    }

    #[test]
    fn failure_codes_follow_status_class() {
        assert_eq!(http_failure_code(StatusCode::BAD_REQUEST), "ERR_BAD_REQUEST");
        assert_eq!(http_failure_code(StatusCode::NOT_FOUND), "ERR_BAD_REQUEST");
        assert_eq!(
            http_failure_code(StatusCode::INTERNAL_SERVER_ERROR),
            "ERR_BAD_RESPONSE"
        );
    }

    #[test]
    fn io_errors_map_to_socket_codes() {
        assert_eq!(
            io_error_code(io::ErrorKind::ConnectionReset),
            Some("ECONNRESET")
        );
        assert_eq!(
            io_error_code(io::ErrorKind::ConnectionRefused),
            Some("ECONNREFUSED")
        );
        assert_eq!(io_error_code(io::ErrorKind::InvalidData), None);
    }

    #[test]
    fn configure_rejects_bad_base_urls() {
        let mut client = RestClient::new("an-app");

        let err = client
            .configure("not a url", ClientOptions::default())
            .expect_err("relative url must be rejected");
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

        let err = client
            .configure("ftp://files.example", ClientOptions::default())
            .expect_err("ftp must be rejected");
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
        assert!(client.base_url().is_none());
    }

    #[test]
    fn configure_trims_trailing_slash_and_last_write_wins() {
        let mut client = RestClient::new("an-app");
        client
            .configure("http://localhost:8000/", ClientOptions::default())
            .expect("first configuration must succeed");
        client
            .configure("http://localhost:9000/api/", ClientOptions::default())
            .expect("second configuration must succeed");

        assert_eq!(client.base_url(), Some("http://localhost:9000/api"));
        let debug = format!("{client:?}");
        assert!(debug.contains("an-app"));
        assert!(debug.contains("http://localhost:9000/api"));
    }

    #[tokio::test]
    async fn unconfigured_client_fails_without_sending() {
        let client = RestClient::new("an-app");

        let err = client
            .get("/", "doing something", RequestOptions::new())
            .await
            .expect_err("unconfigured client must fail");

        assert_eq!(err.message, "client is not configured");
        assert_eq!(err.service, "an-app");
        assert_eq!(err.error_code, None);
        assert_eq!(err.reason, "Unknown reason");
    }
}
