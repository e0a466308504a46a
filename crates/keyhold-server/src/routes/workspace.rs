//! Workspace snapshot, rollback and audit log routes.
//!
//! Any failure, whether bad input, a missing snapshot or a storage error,
//! is reported and answered with a 400 carrying the endpoint's fixed message.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use keyhold_core::ServiceError;
use keyhold_core::audit::{self, LogQuery, LogView};
use keyhold_core::models::{Secret, SecretSnapshot};
use keyhold_core::query::Pagination;
use keyhold_core::rollback::{self, RollbackRequest};
use keyhold_core::snapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{folder_or_root, parse_workspace_id, require_environment};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

const LIST_SNAPSHOTS_FAILED: &str = "Failed to get secret snapshots";
const COUNT_SNAPSHOTS_FAILED: &str = "Failed to count number of secret snapshots";
const ROLLBACK_FAILED: &str = "Failed to roll back secret snapshot";
const LOGS_FAILED: &str = "Failed to get workspace logs";

/// Query parameters for snapshot listing and counting.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    pub environment: Option<String>,
    pub folder_id: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListResponse {
    pub secret_snapshots: Vec<SecretSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotCountResponse {
    pub count: usize,
}

/// Request body for a rollback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackBody {
    pub version: u32,
    pub environment: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SecretsResponse {
    pub secrets: Vec<Secret>,
}

/// Query parameters for log retrieval.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub user_id: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub action_names: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogView>,
}

/// Build the workspace router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{workspace_id}/secret-snapshots", get(list_snapshots))
        .route("/{workspace_id}/secret-snapshots/count", get(count_snapshots))
        .route("/{workspace_id}/secret-snapshots/rollback", post(rollback_snapshot))
        .route("/{workspace_id}/logs", get(get_logs))
}

/// `GET /api/v1/workspace/{workspace_id}/secret-snapshots`
///
/// Snapshots of a folder scope, newest first.
async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> Result<Json<SnapshotListResponse>, ApiError> {
    let Query(query) = query.map_err(|e| state.fail(&principal, LIST_SNAPSHOTS_FAILED, &e))?;
    match list_snapshots_inner(&state, &workspace_id, &query).await {
        Ok(secret_snapshots) => Ok(Json(SnapshotListResponse { secret_snapshots })),
        Err(e) => Err(state.fail(&principal, LIST_SNAPSHOTS_FAILED, &e)),
    }
}

async fn list_snapshots_inner(
    state: &AppState,
    workspace_id: &str,
    query: &SnapshotQuery,
) -> Result<Vec<SecretSnapshot>, ServiceError> {
    let workspace = parse_workspace_id(workspace_id)?;
    let environment = require_environment(query.environment.as_deref())?;
    let page = Pagination::from_query(query.offset.as_deref(), query.limit.as_deref())?;
    snapshot::list_snapshots(
        &state.store,
        workspace,
        environment,
        folder_or_root(query.folder_id.as_deref()),
        page,
    )
    .await
}

/// `GET /api/v1/workspace/{workspace_id}/secret-snapshots/count`
async fn count_snapshots(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> Result<Json<SnapshotCountResponse>, ApiError> {
    let Query(query) = query.map_err(|e| state.fail(&principal, COUNT_SNAPSHOTS_FAILED, &e))?;
    match count_snapshots_inner(&state, &workspace_id, &query).await {
        Ok(count) => Ok(Json(SnapshotCountResponse { count })),
        Err(e) => Err(state.fail(&principal, COUNT_SNAPSHOTS_FAILED, &e)),
    }
}

async fn count_snapshots_inner(
    state: &AppState,
    workspace_id: &str,
    query: &SnapshotQuery,
) -> Result<usize, ServiceError> {
    let workspace = parse_workspace_id(workspace_id)?;
    let environment = require_environment(query.environment.as_deref())?;
    snapshot::count_snapshots(
        &state.store,
        workspace,
        environment,
        folder_or_root(query.folder_id.as_deref()),
    )
    .await
}

/// `POST /api/v1/workspace/{workspace_id}/secret-snapshots/rollback`
///
/// Restore a folder scope to the snapshot with the given version.
async fn rollback_snapshot(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    body: Result<Json<RollbackBody>, JsonRejection>,
) -> Result<Json<SecretsResponse>, ApiError> {
    let Json(body) = body.map_err(|e| state.fail(&principal, ROLLBACK_FAILED, &e))?;
    let workspace =
        parse_workspace_id(&workspace_id).map_err(|e| state.fail(&principal, ROLLBACK_FAILED, &e))?;

    let req = RollbackRequest {
        workspace,
        environment: body.environment,
        folder_id: folder_or_root(body.folder_id.as_deref()).to_owned(),
        version: body.version,
    };
    match rollback::rollback(&state.store, &req).await {
        Ok(secrets) => Ok(Json(SecretsResponse { secrets })),
        Err(e) => Err(state.fail(&principal, ROLLBACK_FAILED, &e)),
    }
}

/// `GET /api/v1/workspace/{workspace_id}/logs`
async fn get_logs(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query.map_err(|e| state.fail(&principal, LOGS_FAILED, &e))?;
    match get_logs_inner(&state, &workspace_id, query).await {
        Ok(logs) => Ok(Json(LogsResponse { logs })),
        Err(e) => Err(state.fail(&principal, LOGS_FAILED, &e)),
    }
}

async fn get_logs_inner(
    state: &AppState,
    workspace_id: &str,
    query: LogsQuery,
) -> Result<Vec<LogView>, ServiceError> {
    let workspace = parse_workspace_id(workspace_id)?;
    let user_id = query
        .user_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|e| ServiceError::InvalidInput {
                reason: format!("invalid user id '{raw}': {e}"),
            })
        })
        .transpose()?;
    let page = Pagination::from_query(query.offset.as_deref(), query.limit.as_deref())?;

    let log_query = LogQuery {
        user_id,
        action_names: query.action_names,
        page,
        ..LogQuery::default()
    }
    .with_sort_by(query.sort_by.as_deref());
    audit::get_workspace_logs(&state.store, workspace, &log_query).await
}
