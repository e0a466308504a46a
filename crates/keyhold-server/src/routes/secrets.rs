//! Secret write routes.
//!
//! Bodies carry client-encrypted fields only; the server stores them as
//! given.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Extension, Json, Router};
use keyhold_core::ServiceError;
use keyhold_core::models::{Secret, SecretComment, SecretPayload, SecretType};
use keyhold_core::secrets::{self, NewSecret, SecretUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workspace::SecretsResponse;
use super::{folder_or_root, parse_workspace_id, require_environment};
use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

const ADD_FAILED: &str = "Failed to add secrets";
const UPDATE_FAILED: &str = "Failed to update secret";
const DELETE_FAILED: &str = "Failed to delete secret";

/// One secret in a create request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretInput {
    #[serde(rename = "type", default)]
    pub secret_type: SecretType,
    #[serde(flatten)]
    pub payload: SecretPayload,
    #[serde(flatten)]
    pub comment: SecretComment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretsBody {
    pub environment: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub secrets: Vec<SecretInput>,
}

/// Replacement fields for an update. Comment fields are optional; sending
/// any of them replaces the whole comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecretBody {
    #[serde(flatten)]
    pub payload: SecretPayload,
    #[serde(default)]
    pub secret_comment_ciphertext: Option<String>,
    #[serde(default, rename = "secretCommentIV")]
    pub secret_comment_iv: Option<String>,
    #[serde(default)]
    pub secret_comment_tag: Option<String>,
}

impl UpdateSecretBody {
    fn into_update(self) -> SecretUpdate {
        let comment = match (
            self.secret_comment_ciphertext,
            self.secret_comment_iv,
            self.secret_comment_tag,
        ) {
            (None, None, None) => None,
            (ciphertext, iv, tag) => Some(SecretComment {
                secret_comment_ciphertext: ciphertext.unwrap_or_default(),
                secret_comment_iv: iv.unwrap_or_default(),
                secret_comment_tag: tag.unwrap_or_default(),
            }),
        };
        SecretUpdate {
            payload: self.payload,
            comment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SecretResponse {
    pub secret: Secret,
}

/// Build the secrets router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{workspace_id}/secrets", post(create_secrets))
        .route(
            "/{workspace_id}/secrets/{secret_id}",
            patch(update_secret).delete(delete_secret),
        )
}

fn parse_secret_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|e| ServiceError::InvalidInput {
        reason: format!("invalid secret id '{raw}': {e}"),
    })
}

/// `POST /api/v1/workspace/{workspace_id}/secrets`
async fn create_secrets(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<String>,
    body: Result<Json<CreateSecretsBody>, JsonRejection>,
) -> Result<Json<SecretsResponse>, ApiError> {
    let Json(body) = body.map_err(|e| state.fail(&principal, ADD_FAILED, &e))?;
    match create_secrets_inner(&state, &principal, &workspace_id, body).await {
        Ok(secrets) => Ok(Json(SecretsResponse { secrets })),
        Err(e) => Err(state.fail(&principal, ADD_FAILED, &e)),
    }
}

async fn create_secrets_inner(
    state: &AppState,
    principal: &Principal,
    workspace_id: &str,
    body: CreateSecretsBody,
) -> Result<Vec<Secret>, ServiceError> {
    let workspace = parse_workspace_id(workspace_id)?;
    let environment = require_environment(Some(body.environment.as_str()))?;
    let inputs = body
        .secrets
        .into_iter()
        .map(|s| NewSecret {
            secret_type: s.secret_type,
            payload: s.payload,
            comment: s.comment,
        })
        .collect();
    secrets::create_secrets(
        &state.store,
        principal.actor(),
        workspace,
        environment,
        folder_or_root(body.folder_id.as_deref()),
        inputs,
    )
    .await
}

/// `PATCH /api/v1/workspace/{workspace_id}/secrets/{secret_id}`
async fn update_secret(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((workspace_id, secret_id)): Path<(String, String)>,
    body: Result<Json<UpdateSecretBody>, JsonRejection>,
) -> Result<Json<SecretResponse>, ApiError> {
    let Json(body) = body.map_err(|e| state.fail(&principal, UPDATE_FAILED, &e))?;
    let result = match (parse_workspace_id(&workspace_id), parse_secret_id(&secret_id)) {
        (Ok(workspace), Ok(secret_id)) => {
            secrets::update_secret(
                &state.store,
                principal.actor(),
                workspace,
                secret_id,
                body.into_update(),
            )
            .await
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    };
    result
        .map(|secret| Json(SecretResponse { secret }))
        .map_err(|e| state.fail(&principal, UPDATE_FAILED, &e))
}

/// `DELETE /api/v1/workspace/{workspace_id}/secrets/{secret_id}`
async fn delete_secret(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((workspace_id, secret_id)): Path<(String, String)>,
) -> Result<Json<SecretResponse>, ApiError> {
    let result = match (parse_workspace_id(&workspace_id), parse_secret_id(&secret_id)) {
        (Ok(workspace), Ok(secret_id)) => {
            secrets::delete_secret(&state.store, principal.actor(), workspace, secret_id).await
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    };
    result
        .map(|secret| Json(SecretResponse { secret }))
        .map_err(|e| state.fail(&principal, DELETE_FAILED, &e))
}
