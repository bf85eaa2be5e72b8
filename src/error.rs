/// The single error kind returned by [`RestClient`](crate::RestClient) calls.
///
/// Callers tell failures apart by inspecting the fields: a transport failure
/// has no `error_code`, an HTTP failure carries the response status.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RestClientError {
    /// Upstream `errors` joined with `", "`, upstream `message`, or `"Unknown error"`.
    pub message: String,
    /// App identifier the client was constructed with.
    pub service: String,
    /// HTTP status of the failed response; `None` when no response arrived.
    pub error_code: Option<u16>,
    /// `error_identifier` from the upstream error body.
    pub error_identifier: Option<String>,
    /// `reason` from the upstream error body, or `"Unknown reason"`.
    pub reason: String,
}

/// Error returned while configuring a client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The base URL could not be parsed.
    #[error("invalid base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The base URL uses something other than http or https.
    #[error("unsupported scheme '{scheme}' in base url")]
    UnsupportedScheme { scheme: String },
    /// The underlying HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Transport(#[from] reqwest::Error),
}
