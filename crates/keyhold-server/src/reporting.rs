//! Error reporting.
//!
//! Handler failures are reported with the email of the principal that made
//! the request. The context is passed explicitly on every call; there is no
//! per-request global scope.

use std::error::Error;

use tracing::error;

/// Who was asking, and for what, when an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Email of the requesting principal.
    pub email: String,
    /// Name of the failed operation.
    pub operation: &'static str,
}

/// Sink for handler failures.
pub trait ErrorReporter: Send + Sync {
    /// Report `error` with its request context.
    fn report(&self, ctx: &ErrorContext, error: &(dyn Error + 'static));
}

/// Reports errors as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, ctx: &ErrorContext, err: &(dyn Error + 'static)) {
        error!(
            email = %ctx.email,
            operation = ctx.operation,
            error = %err,
            "request failed"
        );
    }
}
