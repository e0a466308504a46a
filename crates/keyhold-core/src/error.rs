//! Error types for `keyhold-core`.
//!
//! [`StoreError`] covers the document store: the backend failed, or a stored
//! document could not be (de)serialised. [`ServiceError`] is what the
//! workspace operations return; it wraps store failures and adds the domain
//! cases (missing snapshot, unknown folder, bad input).

use keyhold_storage::StorageError;
use uuid::Uuid;

/// Errors from the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend returned an error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A document could not be encoded for storage.
    #[error("failed to encode {collection} document: {reason}")]
    Encode {
        collection: &'static str,
        reason: String,
    },

    /// A stored document could not be decoded.
    #[error("failed to decode {collection} document '{key}': {reason}")]
    Decode {
        collection: &'static str,
        key: String,
        reason: String,
    },

    /// An insert collided with an existing document id.
    #[error("duplicate id {id} in {collection}")]
    Duplicate { collection: &'static str, id: Uuid },
}

/// Errors from workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No snapshot matches the requested workspace, environment, folder and version.
    #[error(
        "secret snapshot version {version} not found for workspace {workspace} \
         environment '{environment}' folder '{folder_id}'"
    )]
    SnapshotNotFound {
        workspace: Uuid,
        environment: String,
        folder_id: String,
        version: u32,
    },

    /// A snapshot references a secret version that no longer exists.
    #[error("secret version {id} referenced by snapshot is missing")]
    SecretVersionMissing { id: Uuid },

    /// The secret does not exist in the workspace.
    #[error("secret {id} not found")]
    SecretNotFound { id: Uuid },

    /// The folder does not exist in the workspace environment.
    #[error("folder '{folder_id}' not found in environment '{environment}'")]
    FolderNotFound {
        environment: String,
        folder_id: String,
    },

    /// The caller supplied invalid input.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        Self::Store(StoreError::Storage(err))
    }
}
