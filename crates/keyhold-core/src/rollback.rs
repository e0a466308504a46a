//! Rolling a folder scope back to a snapshot.
//!
//! A rollback does not reuse old version numbers. Each restored secret gets
//! the next version after its latest one, so the rollback is itself a new,
//! traceable state and is followed by a fresh snapshot.
//!
//! The steps run one after another against the document store with no
//! transaction around them. A failure part-way (say, after the live secrets
//! were deleted but before they were recreated) leaves the scope partially
//! rolled back; the error is returned and nothing is compensated.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::folder;
use crate::models::{
    Folder, FolderVersion, ROOT_FOLDER_ID, Secret, SecretComment, SecretSnapshot, SecretVersion,
    new_id,
};
use crate::snapshot;
use crate::store::DocumentStore;
use crate::versioning;

/// Which snapshot to roll back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRequest {
    pub workspace: Uuid,
    pub environment: String,
    pub folder_id: String,
    pub version: u32,
}

impl RollbackRequest {
    /// A rollback of the root folder.
    #[must_use]
    pub fn root(workspace: Uuid, environment: impl Into<String>, version: u32) -> Self {
        Self {
            workspace,
            environment: environment.into(),
            folder_id: ROOT_FOLDER_ID.to_owned(),
            version,
        }
    }
}

/// Restore the secrets and folder subtree captured by the snapshot named in
/// `req`, then snapshot the result. Returns the recreated secrets.
///
/// # Errors
///
/// Returns [`ServiceError::SnapshotNotFound`] before touching anything if no
/// snapshot matches, [`ServiceError::SecretVersionMissing`] if the snapshot
/// references a version that no longer exists, or a store error from any
/// later step.
pub async fn rollback(
    store: &DocumentStore,
    req: &RollbackRequest,
) -> Result<Vec<Secret>, ServiceError> {
    let RollbackRequest {
        workspace,
        environment,
        folder_id,
        version,
    } = req;
    let (workspace, version) = (*workspace, *version);
    let environment = environment.as_str();
    let folder_id = folder_id.as_str();

    let snap = store
        .collection::<SecretSnapshot>()
        .find_one(|s| {
            s.workspace == workspace
                && s.version == version
                && s.environment == environment
                && s.folder_id == folder_id
        })
        .await?
        .ok_or_else(|| ServiceError::SnapshotNotFound {
            workspace,
            environment: environment.to_owned(),
            folder_id: folder_id.to_owned(),
            version,
        })?;

    let snap_versions = store
        .collection::<SecretVersion>()
        .find_by_ids(&snap.secret_versions)
        .await?;
    if snap_versions.len() != snap.secret_versions.len() {
        let found: HashSet<Uuid> = snap_versions.iter().map(|v| v.id).collect();
        if let Some(id) = snap.secret_versions.iter().find(|id| !found.contains(id)) {
            return Err(ServiceError::SecretVersionMissing { id: *id });
        }
    }
    let snap_folder_version = match snap.folder_version {
        Some(id) => store.collection::<FolderVersion>().find_by_id(id).await?,
        None => None,
    };
    debug!(
        workspace = %workspace,
        environment,
        folder_id,
        version,
        secrets = snap_versions.len(),
        "rollback: snapshot resolved"
    );

    let secret_ids: Vec<Uuid> = snap_versions.iter().map(|v| v.secret).collect();
    let next_versions: HashMap<Uuid, u32> = versioning::latest_secret_versions(store, &secret_ids)
        .await?
        .into_iter()
        .map(|(id, latest)| (id, latest.version.saturating_add(1)))
        .collect();

    // Recompute the tree and the set of folders whose secrets get replaced.
    let mut tree = folder::get_folder(store, workspace, environment)
        .await?
        .map(|f| f.nodes);
    let mut scope: Vec<String> = Vec::new();
    let node_version = snapshot::latest_folder_version(store, workspace, environment, folder_id)
        .await?
        .map_or(0, |v| v.nodes.version);
    if let Some(node) = tree.as_mut().and_then(|t| t.find_mut(folder_id)) {
        scope = node.descendant_ids();
        node.children = snap_folder_version
            .map(|v| v.nodes.children)
            .unwrap_or_default();
        node.version = node_version.saturating_add(1);
    }

    let deleted = if folder_id != ROOT_FOLDER_ID && !scope.is_empty() {
        let scope: HashSet<&str> = scope.iter().map(String::as_str).collect();
        store
            .collection::<Secret>()
            .delete_many(|s| {
                s.workspace == workspace
                    && s.environment == environment
                    && scope.contains(s.folder.as_str())
            })
            .await?
    } else {
        store
            .collection::<Secret>()
            .delete_many(|s| s.workspace == workspace && s.environment == environment)
            .await?
    };
    store
        .collection::<Folder>()
        .delete_many(|f| f.workspace == workspace && f.environment == environment)
        .await?;
    debug!(workspace = %workspace, environment, deleted, "rollback: live secrets removed");

    let now = Utc::now();
    let secrets = snap_versions
        .iter()
        .map(|sv| {
            let version = *next_versions
                .get(&sv.secret)
                .ok_or(ServiceError::SecretVersionMissing { id: sv.id })?;
            Ok(Secret {
                id: sv.secret,
                version,
                workspace: sv.workspace,
                secret_type: sv.secret_type,
                user: sv.user,
                environment: sv.environment.clone(),
                folder: sv.folder.clone(),
                payload: sv.payload.clone(),
                comment: SecretComment::default(),
                created_at: sv.created_at,
                updated_at: now,
            })
        })
        .collect::<Result<Vec<Secret>, ServiceError>>()?;
    store.collection::<Secret>().insert_many(&secrets).await?;

    let versions: Vec<SecretVersion> = secrets.iter().map(SecretVersion::of).collect();
    store
        .collection::<SecretVersion>()
        .insert_many(&versions)
        .await?;
    debug!(workspace = %workspace, restored = secrets.len(), "rollback: secrets recreated");

    if let Some(nodes) = tree {
        store
            .collection::<Folder>()
            .insert_one(&Folder {
                id: new_id(),
                workspace,
                environment: environment.to_owned(),
                nodes: nodes.clone(),
            })
            .await?;
        store
            .collection::<FolderVersion>()
            .insert_one(&FolderVersion {
                id: new_id(),
                workspace,
                environment: environment.to_owned(),
                nodes,
                created_at: now,
            })
            .await?;
        debug!(workspace = %workspace, environment, "rollback: folder tree restored");
    }

    let restored: HashSet<Uuid> = secret_ids.into_iter().collect();
    store
        .collection::<SecretVersion>()
        .update_many(|v| restored.contains(&v.secret), |v| v.is_deleted = false)
        .await?;

    let fresh = snapshot::take_secret_snapshot(store, workspace, environment, folder_id).await?;

    info!(
        workspace = %workspace,
        environment,
        folder_id,
        from_version = version,
        snapshot_version = fresh.version,
        restored = secrets.len(),
        "secret snapshot rolled back"
    );
    Ok(secrets)
}
