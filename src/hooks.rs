use std::{fmt, sync::Arc};

use reqwest::header::HeaderMap;

use crate::{ErrorContext, RequestContext, ResponseContext};

/// Observer callback receiving a lifecycle context.
pub type Hook<C> = Arc<dyn Fn(&C) + Send + Sync>;

/// Callback producing extra headers for each outgoing attempt.
pub type HeaderTransform = Arc<dyn Fn() -> HeaderMap + Send + Sync>;

/// Optional observer callbacks invoked around every physical attempt.
///
/// Hooks run synchronously, in order, on the task driving the call.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_request_start: Option<Hook<RequestContext>>,
    pub on_success_response: Option<Hook<ResponseContext>>,
    pub on_failure_response: Option<Hook<ErrorContext>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request_start(mut self, hook: impl Fn(&RequestContext) + Send + Sync + 'static) -> Self {
        self.on_request_start = Some(Arc::new(hook));
        self
    }

    pub fn on_success_response(
        mut self,
        hook: impl Fn(&ResponseContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_success_response = Some(Arc::new(hook));
        self
    }

    pub fn on_failure_response(
        mut self,
        hook: impl Fn(&ErrorContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure_response = Some(Arc::new(hook));
        self
    }

    pub(crate) fn request_start(&self, ctx: &RequestContext) {
        if let Some(hook) = &self.on_request_start {
            hook(ctx);
        }
    }

    pub(crate) fn success_response(&self, ctx: &ResponseContext) {
        if let Some(hook) = &self.on_success_response {
            hook(ctx);
        }
    }

    pub(crate) fn failure_response(&self, ctx: &ErrorContext) {
        if let Some(hook) = &self.on_failure_response {
            hook(ctx);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_request_start", &self.on_request_start.is_some())
            .field("on_success_response", &self.on_success_response.is_some())
            .field("on_failure_response", &self.on_failure_response.is_some())
            .finish()
    }
}
