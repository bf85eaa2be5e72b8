//! Ready-made hooks that log every attempt through `tracing`.
//!
//! Enabled with the `tracing` feature.

use std::time::Duration;

use crate::{ErrorContext, Hooks, RequestContext, ResponseContext};

impl Hooks {
    /// Hooks emitting one structured event per lifecycle step.
    ///
    /// Failures that will be retried are logged at `warn`, terminal failures
    /// at `error`. Each event carries the caller's additional logging fields
    /// as a JSON string.
    pub fn tracing() -> Self {
        Self::new()
            .on_request_start(log_request_start)
            .on_success_response(log_success_response)
            .on_failure_response(log_failure_response)
    }
}

fn log_request_start(ctx: &RequestContext) {
    tracing::info!(
        service = %ctx.service,
        method = %ctx.method,
        url = %ctx.url,
        retry_count = ctx.retry_count,
        fields = %serde_json::Value::Object(ctx.additional_logging_fields.clone()),
        "Calling {} to {}",
        ctx.service,
        ctx.description
    );
}

fn log_success_response(ctx: &ResponseContext) {
    tracing::info!(
        service = %ctx.service,
        method = %ctx.method,
        url = %ctx.url,
        status = ctx.status,
        response_time_ms = millis(ctx.response_time),
        retry = ctx.retry,
        fields = %serde_json::Value::Object(ctx.additional_logging_fields.clone()),
        "{} {} to {} completed",
        ctx.method,
        ctx.description,
        ctx.service
    );
}

fn log_failure_response(ctx: &ErrorContext) {
    let fields = serde_json::Value::Object(ctx.additional_logging_fields.clone());
    if ctx.retry {
        tracing::warn!(
            service = %ctx.service,
            method = %ctx.method,
            url = %ctx.url,
            status = ctx.status,
            code = ctx.code.as_deref(),
            response_time_ms = millis(ctx.response_time),
            fields = %fields,
            "{} to {} failed, retrying: {}",
            ctx.description,
            ctx.service,
            ctx.message
        );
    } else {
        tracing::error!(
            service = %ctx.service,
            method = %ctx.method,
            url = %ctx.url,
            status = ctx.status,
            code = ctx.code.as_deref(),
            error_identifier = ctx.error_identifier.as_deref(),
            reason = %ctx.reason,
            response_time_ms = millis(ctx.response_time),
            fields = %fields,
            "{} to {} failed: {}",
            ctx.description,
            ctx.service,
            ctx.message
        );
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::millis;
    use crate::Hooks;

    #[test]
    fn millis_saturates_instead_of_truncating() {
        assert_eq!(millis(Duration::from_millis(1_250)), 1_250);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn tracing_hooks_fill_every_slot() {
        let hooks = Hooks::tracing();

        assert!(hooks.on_request_start.is_some());
        assert!(hooks.on_success_response.is_some());
        assert!(hooks.on_failure_response.is_some());
    }
}
