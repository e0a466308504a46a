//! Secret snapshots: capture, listing and counting.
//!
//! A snapshot is scoped to `(workspace, environment, folder_id)` and numbered
//! per scope starting at 1. It references the latest [`SecretVersion`] of
//! every secret in the folder's subtree and the latest [`FolderVersion`]
//! recorded for the folder itself.

use std::collections::HashSet;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::folder;
use crate::models::{FolderVersion, Secret, SecretSnapshot, new_id};
use crate::query::Pagination;
use crate::store::{DocumentStore, FindOptions};
use crate::versioning;

fn in_scope(s: &SecretSnapshot, workspace: Uuid, environment: &str, folder_id: &str) -> bool {
    s.workspace == workspace && s.environment == environment && s.folder_id == folder_id
}

/// The most recent folder version whose subtree is rooted at `folder_id`,
/// judged by the root node's version number.
///
/// # Errors
///
/// Returns a store error.
pub async fn latest_folder_version(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
) -> Result<Option<FolderVersion>, ServiceError> {
    Ok(store
        .collection::<FolderVersion>()
        .find_one_sorted(
            |v| v.workspace == workspace && v.environment == environment && v.nodes.id == folder_id,
            |a, b| {
                b.nodes
                    .version
                    .cmp(&a.nodes.version)
                    .then(b.created_at.cmp(&a.created_at))
            },
        )
        .await?)
}

/// Capture the current state of a folder scope as a new snapshot.
///
/// # Errors
///
/// Returns a store error.
pub async fn take_secret_snapshot(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
) -> Result<SecretSnapshot, ServiceError> {
    let scope: HashSet<String> = folder::folder_scope(store, workspace, environment, folder_id)
        .await?
        .into_iter()
        .collect();

    let secret_ids: Vec<Uuid> = store
        .collection::<Secret>()
        .find(|s| {
            s.workspace == workspace && s.environment == environment && scope.contains(&s.folder)
        })
        .await?
        .iter()
        .map(|s| s.id)
        .collect();

    let latest = versioning::latest_secret_versions(store, &secret_ids).await?;
    let secret_versions: Vec<Uuid> = secret_ids
        .iter()
        .filter_map(|id| latest.get(id).map(|v| v.id))
        .collect();

    let previous = store
        .collection::<SecretSnapshot>()
        .find_one_sorted(
            |s| in_scope(s, workspace, environment, folder_id),
            |a, b| b.version.cmp(&a.version),
        )
        .await?;

    let folder_version = latest_folder_version(store, workspace, environment, folder_id).await?;

    let now = Utc::now();
    let snapshot = SecretSnapshot {
        id: new_id(),
        workspace,
        environment: environment.to_owned(),
        folder_id: folder_id.to_owned(),
        version: previous.map_or(1, |s| s.version.saturating_add(1)),
        secret_versions,
        folder_version: folder_version.map(|v| v.id),
        created_at: now,
        updated_at: now,
    };
    store
        .collection::<SecretSnapshot>()
        .insert_one(&snapshot)
        .await?;

    debug!(
        workspace = %workspace,
        environment,
        folder_id,
        version = snapshot.version,
        secrets = snapshot.secret_versions.len(),
        "secret snapshot taken"
    );
    Ok(snapshot)
}

/// Snapshots of a folder scope, newest first.
///
/// # Errors
///
/// Returns a store error.
pub async fn list_snapshots(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
    page: Pagination,
) -> Result<Vec<SecretSnapshot>, ServiceError> {
    let options = FindOptions::default()
        .sort_by(|a: &SecretSnapshot, b: &SecretSnapshot| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        })
        .skip(page.skip)
        .limit(page.limit);

    Ok(store
        .collection::<SecretSnapshot>()
        .find_with(|s| in_scope(s, workspace, environment, folder_id), options)
        .await?)
}

/// Number of snapshots of a folder scope.
///
/// # Errors
///
/// Returns a store error.
pub async fn count_snapshots(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
) -> Result<usize, ServiceError> {
    Ok(store
        .collection::<SecretSnapshot>()
        .count(|s| in_scope(s, workspace, environment, folder_id))
        .await?)
}
