//! Unauthenticated status route.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Build the status router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/status", get(status))
}

/// `GET /api/v1/status`
async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
