//! Secret writes.
//!
//! Each write produces new [`SecretVersion`] records, an audit log entry and a
//! fresh snapshot of the affected folder, so every state a secret passes
//! through can later be rolled back to.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, ACTION_ADD_SECRETS, ACTION_DELETE_SECRETS, ACTION_UPDATE_SECRETS};
use crate::error::ServiceError;
use crate::folder;
use crate::models::{
    Actor, Secret, SecretComment, SecretPayload, SecretType, SecretVersion, SecretVersionChange,
    new_id,
};
use crate::snapshot;
use crate::store::DocumentStore;
use crate::versioning;

/// Client-encrypted input for a new secret.
#[derive(Debug, Clone, Default)]
pub struct NewSecret {
    pub secret_type: SecretType,
    pub payload: SecretPayload,
    pub comment: SecretComment,
}

/// Replacement encrypted fields for an existing secret. A `None` comment
/// leaves the stored comment as is.
#[derive(Debug, Clone, Default)]
pub struct SecretUpdate {
    pub payload: SecretPayload,
    pub comment: Option<SecretComment>,
}

/// Add secrets to a folder of a workspace environment.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidInput`] for an empty batch,
/// [`ServiceError::FolderNotFound`] for an unknown folder, or a store error.
pub async fn create_secrets(
    store: &DocumentStore,
    actor: Actor,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
    inputs: Vec<NewSecret>,
) -> Result<Vec<Secret>, ServiceError> {
    if inputs.is_empty() {
        return Err(ServiceError::InvalidInput {
            reason: "no secrets given".to_owned(),
        });
    }
    folder::ensure_folder_exists(store, workspace, environment, folder_id).await?;

    let now = Utc::now();
    let secrets: Vec<Secret> = inputs
        .into_iter()
        .map(|input| Secret {
            id: new_id(),
            version: 1,
            workspace,
            secret_type: input.secret_type,
            user: match input.secret_type {
                SecretType::Personal => actor.user(),
                SecretType::Shared => None,
            },
            environment: environment.to_owned(),
            folder: folder_id.to_owned(),
            payload: input.payload,
            comment: input.comment,
            created_at: now,
            updated_at: now,
        })
        .collect();
    let versions: Vec<SecretVersion> = secrets.iter().map(SecretVersion::of).collect();

    store.collection::<Secret>().insert_many(&secrets).await?;
    store
        .collection::<SecretVersion>()
        .insert_many(&versions)
        .await?;

    let changes = versions
        .iter()
        .map(|v| SecretVersionChange {
            old_secret_version: None,
            new_secret_version: v.id,
        })
        .collect();
    audit::record_action(store, actor, workspace, ACTION_ADD_SECRETS, changes).await?;
    snapshot::take_secret_snapshot(store, workspace, environment, folder_id).await?;

    info!(
        workspace = %workspace,
        environment,
        folder_id,
        count = secrets.len(),
        "secrets added"
    );
    Ok(secrets)
}

async fn load_secret(
    store: &DocumentStore,
    workspace: Uuid,
    secret_id: Uuid,
) -> Result<Secret, ServiceError> {
    store
        .collection::<Secret>()
        .find_by_id(secret_id)
        .await?
        .filter(|s| s.workspace == workspace)
        .ok_or(ServiceError::SecretNotFound { id: secret_id })
}

async fn latest_version_id(
    store: &DocumentStore,
    secret_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let latest = versioning::latest_secret_versions(store, &[secret_id]).await?;
    Ok(latest.get(&secret_id).map(|v| v.id))
}

/// Replace the encrypted fields of a secret, advancing its version.
///
/// # Errors
///
/// Returns [`ServiceError::SecretNotFound`] if the secret is not in the
/// workspace, or a store error.
pub async fn update_secret(
    store: &DocumentStore,
    actor: Actor,
    workspace: Uuid,
    secret_id: Uuid,
    update: SecretUpdate,
) -> Result<Secret, ServiceError> {
    let mut secret = load_secret(store, workspace, secret_id).await?;
    let previous = latest_version_id(store, secret_id).await?;

    secret.version = secret.version.saturating_add(1);
    secret.payload = update.payload;
    if let Some(comment) = update.comment {
        secret.comment = comment;
    }
    secret.updated_at = Utc::now();

    let version = SecretVersion::of(&secret);
    store.collection::<Secret>().replace_one(&secret).await?;
    store
        .collection::<SecretVersion>()
        .insert_one(&version)
        .await?;

    let change = SecretVersionChange {
        old_secret_version: previous,
        new_secret_version: version.id,
    };
    audit::record_action(store, actor, workspace, ACTION_UPDATE_SECRETS, vec![change]).await?;
    snapshot::take_secret_snapshot(store, workspace, &secret.environment, &secret.folder).await?;

    info!(workspace = %workspace, secret_id = %secret.id, version = secret.version, "secret updated");
    Ok(secret)
}

/// Delete a secret. Its versions are kept and flagged deleted.
///
/// # Errors
///
/// Returns [`ServiceError::SecretNotFound`] if the secret is not in the
/// workspace, or a store error.
pub async fn delete_secret(
    store: &DocumentStore,
    actor: Actor,
    workspace: Uuid,
    secret_id: Uuid,
) -> Result<Secret, ServiceError> {
    let secret = load_secret(store, workspace, secret_id).await?;
    let previous = latest_version_id(store, secret_id).await?;

    store
        .collection::<Secret>()
        .delete_one(|s| s.id == secret_id)
        .await?;
    store
        .collection::<SecretVersion>()
        .update_many(|v| v.secret == secret_id, |v| v.is_deleted = true)
        .await?;

    if let Some(last) = previous {
        let change = SecretVersionChange {
            old_secret_version: Some(last),
            new_secret_version: last,
        };
        audit::record_action(store, actor, workspace, ACTION_DELETE_SECRETS, vec![change]).await?;
    }
    snapshot::take_secret_snapshot(store, workspace, &secret.environment, &secret.folder).await?;

    info!(workspace = %workspace, secret_id = %secret.id, "secret deleted");
    Ok(secret)
}
