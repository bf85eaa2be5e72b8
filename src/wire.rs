use serde_json::{Map, Value};

pub(crate) const UNKNOWN_ERROR: &str = "Unknown error";
pub(crate) const UNKNOWN_REASON: &str = "Unknown reason";
pub(crate) const ECONNRESET: &str = "ECONNRESET";

/// Error details an upstream service may put in a JSON response body:
/// `{ "error_identifier", "reason", "message", "errors": [..], "code" }`.
///
/// Decoding is lenient: a body that is not a JSON object, or a field of the
/// wrong type, simply yields `None` for that field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ErrorBody {
    pub error_identifier: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn from_json(data: Option<&Value>) -> Self {
        let Some(Value::Object(object)) = data else {
            return Self::default();
        };

        Self {
            error_identifier: string_field(object, "error_identifier"),
            reason: string_field(object, "reason"),
            message: string_field(object, "message"),
            errors: errors_field(object),
            code: string_field(object, "code"),
        }
    }

    /// Message for a failed attempt: joined `errors`, then `message`, then
    /// the `"Unknown error"` fallback.
    ///
    /// An `errors` array always wins, even when empty.
    pub fn failure_message(&self) -> String {
        if let Some(errors) = &self.errors {
            return errors.join(", ");
        }
        self.message
            .clone()
            .unwrap_or_else(|| UNKNOWN_ERROR.to_owned())
    }

    pub fn failure_reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| UNKNOWN_REASON.to_owned())
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

fn errors_field(object: &Map<String, Value>) -> Option<Vec<String>> {
    let Some(Value::Array(items)) = object.get("errors") else {
        return None;
    };

    let errors = items
        .iter()
        .map(|item| match item {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect();
    Some(errors)
}
