//! Request context propagation for correlation IDs.
//!
//! The service tags every operation span with a request id. Callers that
//! already carry one (an HTTP layer with `X-Request-Id`, say) enter it before
//! calling; otherwise the service generates one per call.

use std::cell::RefCell;
use uuid::Uuid;

/// Per-request context with correlation ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Creates a new request context with a time-ordered generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
        }
    }

    /// Creates a new request context with an existing request ID.
    #[must_use]
    pub fn from_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Guard that restores the previous context on drop.
pub struct RequestContextGuard {
    previous: Option<RequestContext>,
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a request context on the current thread.
#[must_use]
pub fn enter_request_context(context: RequestContext) -> RequestContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(context));
    RequestContextGuard { previous }
}

/// Returns the current request ID, if set.
#[must_use]
pub fn current_request_id() -> Option<String> {
    THREAD_CONTEXT.with(|slot| slot.borrow().as_ref().map(|ctx| ctx.request_id.clone()))
}

/// Returns the current request ID, or a fresh one when none is set.
///
/// A generated id is not entered into the context: each service call made
/// outside [`enter_request_context`] gets its own id, while calls inside one
/// context share the caller's id.
#[must_use]
pub fn request_id_or_new() -> String {
    current_request_id().unwrap_or_else(|| RequestContext::new().request_id)
}
