//! Shared application state for the Keyhold server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::error::Error;
use std::sync::Arc;

use keyhold_core::DocumentStore;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::reporting::{ErrorContext, ErrorReporter};

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Document store over the configured storage backend.
    pub store: DocumentStore,
    /// Where handler failures are reported.
    pub reporter: Arc<dyn ErrorReporter>,
}

impl AppState {
    #[must_use]
    pub fn new(store: DocumentStore, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { store, reporter }
    }

    /// Report `err` on behalf of `principal` and turn it into the endpoint's
    /// fixed 400 response.
    pub fn fail(
        &self,
        principal: &Principal,
        message: &'static str,
        err: &(dyn Error + 'static),
    ) -> ApiError {
        let ctx = ErrorContext {
            email: principal.email.clone(),
            operation: message,
        };
        self.reporter.report(&ctx, err);
        ApiError::BadRequest(message)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
