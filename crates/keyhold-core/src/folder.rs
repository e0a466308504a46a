//! Folder tree traversal and folder creation.
//!
//! A workspace environment has one [`Folder`] document whose `nodes` field is
//! the whole tree, rooted at the node with id [`ROOT_FOLDER_ID`]. Changing a
//! folder's children bumps that folder's `version` and records a
//! [`FolderVersion`] of its subtree, which is what snapshots point at.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{Folder, FolderNode, FolderVersion, ROOT_FOLDER_ID, new_id};
use crate::snapshot;
use crate::store::DocumentStore;

impl FolderNode {
    /// A fresh root node.
    #[must_use]
    pub fn root() -> Self {
        Self {
            id: ROOT_FOLDER_ID.to_owned(),
            name: ROOT_FOLDER_ID.to_owned(),
            version: 1,
            children: Vec::new(),
        }
    }

    /// Depth-first search for the node with `id`, this node included.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&FolderNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, id: &str) -> Option<&mut FolderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Ids of this node and every node below it.
    #[must_use]
    pub fn descendant_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            ids.push(node.id.clone());
            stack.extend(node.children.iter());
        }
        ids
    }
}

/// Load the live folder tree of a workspace environment.
///
/// # Errors
///
/// Returns a store error.
pub async fn get_folder(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
) -> Result<Option<Folder>, ServiceError> {
    Ok(store
        .collection::<Folder>()
        .find_one(|f| f.workspace == workspace && f.environment == environment)
        .await?)
}

/// Ids of `folder_id` and all folders below it, or just `[folder_id]` when
/// the tree does not contain it.
///
/// # Errors
///
/// Returns a store error.
pub async fn folder_scope(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let folder = get_folder(store, workspace, environment).await?;
    Ok(folder
        .as_ref()
        .and_then(|f| f.nodes.find(folder_id))
        .map_or_else(|| vec![folder_id.to_owned()], FolderNode::descendant_ids))
}

/// Check that `folder_id` names a folder of the environment. The root always
/// exists, even before the environment has a folder document.
///
/// # Errors
///
/// Returns [`ServiceError::FolderNotFound`] or a store error.
pub async fn ensure_folder_exists(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    folder_id: &str,
) -> Result<(), ServiceError> {
    if folder_id == ROOT_FOLDER_ID {
        return Ok(());
    }
    let folder = get_folder(store, workspace, environment).await?;
    if folder.is_some_and(|f| f.nodes.find(folder_id).is_some()) {
        Ok(())
    } else {
        Err(ServiceError::FolderNotFound {
            environment: environment.to_owned(),
            folder_id: folder_id.to_owned(),
        })
    }
}

/// Create a folder named `name` under `parent_id`.
///
/// Creates the environment's folder document on first use. The parent's
/// version is bumped, a [`FolderVersion`] of the parent subtree is recorded
/// and a snapshot of the parent folder is taken.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidInput`] for an empty name or a name already
/// used by a sibling, [`ServiceError::FolderNotFound`] if the parent does not
/// exist, or a store error.
pub async fn create_folder(
    store: &DocumentStore,
    workspace: Uuid,
    environment: &str,
    parent_id: &str,
    name: &str,
) -> Result<FolderNode, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput {
            reason: "folder name must not be empty".to_owned(),
        });
    }

    let mut folder = get_folder(store, workspace, environment)
        .await?
        .unwrap_or_else(|| Folder {
            id: new_id(),
            workspace,
            environment: environment.to_owned(),
            nodes: FolderNode::root(),
        });

    let parent = folder
        .nodes
        .find_mut(parent_id)
        .ok_or_else(|| ServiceError::FolderNotFound {
            environment: environment.to_owned(),
            folder_id: parent_id.to_owned(),
        })?;

    if parent.children.iter().any(|c| c.name == name) {
        return Err(ServiceError::InvalidInput {
            reason: format!("folder '{name}' already exists"),
        });
    }

    let child = FolderNode {
        id: Uuid::new_v4().simple().to_string(),
        name: name.to_owned(),
        version: 1,
        children: Vec::new(),
    };
    parent.children.push(child.clone());
    parent.version = parent.version.saturating_add(1);
    let parent_subtree = parent.clone();

    store.collection::<Folder>().replace_one(&folder).await?;
    store
        .collection::<FolderVersion>()
        .insert_one(&FolderVersion {
            id: new_id(),
            workspace,
            environment: environment.to_owned(),
            nodes: parent_subtree,
            created_at: Utc::now(),
        })
        .await?;

    snapshot::take_secret_snapshot(store, workspace, environment, parent_id).await?;

    info!(
        workspace = %workspace,
        environment,
        parent_id,
        folder_id = %child.id,
        "folder created"
    );
    Ok(child)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use keyhold_storage::MemoryBackend;

    use super::*;
    use crate::models::SecretSnapshot;

    fn node(id: &str, children: Vec<FolderNode>) -> FolderNode {
        FolderNode {
            id: id.to_owned(),
            name: id.to_owned(),
            version: 1,
            children,
        }
    }

    fn tree() -> FolderNode {
        node(
            ROOT_FOLDER_ID,
            vec![
                node("a", vec![node("a1", vec![]), node("a2", vec![node("a2x", vec![])])]),
                node("b", vec![]),
            ],
        )
    }

    #[test]
    fn find_locates_nested_node() {
        let root = tree();
        assert_eq!(root.find("a2x").map(|n| n.id.as_str()), Some("a2x"));
        assert_eq!(root.find(ROOT_FOLDER_ID).map(|n| n.id.as_str()), Some("root"));
        assert!(root.find("zzz").is_none());
    }

    #[test]
    fn find_mut_allows_editing_in_place() {
        let mut root = tree();
        root.find_mut("b").unwrap().version = 9;
        assert_eq!(root.find("b").unwrap().version, 9);
    }

    #[test]
    fn descendant_ids_include_self() {
        let root = tree();
        let mut ids = root.find("a").unwrap().descendant_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "a1", "a2", "a2x"]);
    }

    #[test]
    fn leaf_has_only_itself() {
        assert_eq!(tree().find("b").unwrap().descendant_ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn create_folder_bumps_parent_and_records_version() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let ws = new_id();

        let child = create_folder(&store, ws, "dev", ROOT_FOLDER_ID, "api")
            .await
            .unwrap();
        let folder = get_folder(&store, ws, "dev").await.unwrap().unwrap();
        assert_eq!(folder.nodes.version, 2);
        assert_eq!(folder.nodes.children, vec![child.clone()]);

        let versions = store
            .collection::<FolderVersion>()
            .find(|v| v.nodes.id == ROOT_FOLDER_ID)
            .await
            .unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].nodes.version, 2);

        let snapshots = store
            .collection::<SecretSnapshot>()
            .find(|s| s.folder_id == ROOT_FOLDER_ID)
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].folder_version, Some(versions[0].id));
    }

    #[tokio::test]
    async fn create_folder_rejects_unknown_parent_and_duplicates() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let ws = new_id();

        let err = create_folder(&store, ws, "dev", "nope", "x").await.unwrap_err();
        assert!(matches!(err, ServiceError::FolderNotFound { .. }));

        create_folder(&store, ws, "dev", ROOT_FOLDER_ID, "x").await.unwrap();
        let err = create_folder(&store, ws, "dev", ROOT_FOLDER_ID, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn ensure_folder_exists_accepts_root_without_tree() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let ws = new_id();
        ensure_folder_exists(&store, ws, "dev", ROOT_FOLDER_ID).await.unwrap();
        assert!(ensure_folder_exists(&store, ws, "dev", "abc").await.is_err());
    }
}
