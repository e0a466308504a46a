//! Folder creation route.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Extension, Json, Router};
use keyhold_core::ServiceError;
use keyhold_core::folder;
use keyhold_core::models::FolderNode;
use serde::{Deserialize, Serialize};

use super::{folder_or_root, parse_workspace_id, require_environment};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

const CREATE_FAILED: &str = "Failed to create folder";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderBody {
    pub environment: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    pub folder_name: String,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub folder: FolderNode,
}

/// Build the folders router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/{workspace_id}/folders", post(create_folder))
}

/// `POST /api/v1/workspace/{workspace_id}/folders`
async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    body: Result<Json<CreateFolderBody>, JsonRejection>,
) -> Result<Json<FolderResponse>, ApiError> {
    let Json(body) = body.map_err(|e| state.fail(&principal, CREATE_FAILED, &e))?;
    match create_folder_inner(&state, &workspace_id, &body).await {
        Ok(folder) => Ok(Json(FolderResponse { folder })),
        Err(e) => Err(state.fail(&principal, CREATE_FAILED, &e)),
    }
}

async fn create_folder_inner(
    state: &AppState,
    workspace_id: &str,
    body: &CreateFolderBody,
) -> Result<FolderNode, ServiceError> {
    let workspace = parse_workspace_id(workspace_id)?;
    let environment = require_environment(Some(body.environment.as_str()))?;
    folder::create_folder(
        &state.store,
        workspace,
        environment,
        folder_or_root(body.parent_folder_id.as_deref()),
        &body.folder_name,
    )
    .await
}
