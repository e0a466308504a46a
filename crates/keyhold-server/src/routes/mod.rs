//! HTTP routes for the Keyhold API.
//!
//! Everything under `/api/v1/workspace` requires an API key; `/api/v1/status`
//! does not.

pub mod folders;
pub mod secrets;
pub mod sys;
pub mod workspace;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{Router, middleware as axum_mw};
use keyhold_core::ServiceError;
use keyhold_core::models::ROOT_FOLDER_ID;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{API_KEY_HEADER, auth_middleware};
use crate::state::AppState;

/// In-flight request cap for the authenticated API.
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Build the Axum router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let workspace_routes = Router::new()
        .merge(workspace::router())
        .merge(secrets::router())
        .merge(folders::router());

    let authenticated_routes = Router::new()
        .nest("/api/v1/workspace", workspace_routes)
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .layer(tower::limit::ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);

    Router::new()
        .merge(sys::router())
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

pub(crate) fn parse_workspace_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|e| ServiceError::InvalidInput {
        reason: format!("invalid workspace id '{raw}': {e}"),
    })
}

pub(crate) fn require_environment(environment: Option<&str>) -> Result<&str, ServiceError> {
    environment
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput {
            reason: "environment is required".to_owned(),
        })
}

/// An absent or empty folder id means the root folder.
pub(crate) fn folder_or_root(folder_id: Option<&str>) -> &str {
    folder_id.filter(|f| !f.is_empty()).unwrap_or(ROOT_FOLDER_ID)
}
