use std::borrow::Cow;

use reqwest::{header::HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response returned by a successful call.
#[derive(Clone, Debug)]
pub struct RestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    data: Option<Value>,
}

impl RestResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        let data = serde_json::from_slice(&body).ok();
        Self {
            status,
            headers,
            body,
            data,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body parsed as JSON, or `None` if it is empty or not JSON.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header::HeaderMap, StatusCode};
    use serde::Deserialize;
    use serde_json::json;

    use super::RestResponse;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Charge {
        amount: u64,
        reference: String,
    }

    #[test]
    fn parses_json_body() {
        let response = RestResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            br#"{"amount":1000,"reference":"ref-1"}"#.to_vec(),
        );

        assert_eq!(response.data(), Some(&json!({"amount": 1000, "reference": "ref-1"})));
        assert_eq!(
            response.json::<Charge>().expect("body must decode"),
            Charge {
                amount: 1000,
                reference: "ref-1".to_owned()
            }
        );
    }

    #[test]
    fn non_json_body_has_no_data() {
        let response = RestResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new());
        assert!(response.data().is_none());

        let response = RestResponse::new(StatusCode::OK, HeaderMap::new(), b"plain".to_vec());
        assert!(response.data().is_none());
        assert_eq!(response.text(), "plain");
    }
}
