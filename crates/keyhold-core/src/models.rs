//! Document types.
//!
//! Every document carries a time-ordered UUID (v7) id and serialises in
//! camelCase, which is also the JSON shape returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Folder id of the root node of every folder tree.
pub const ROOT_FOLDER_ID: &str = "root";

/// A type stored in a [`DocumentStore`](crate::store::DocumentStore) collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, used as the storage key prefix.
    const COLLECTION: &'static str;

    /// The document's id.
    fn id(&self) -> Uuid;
}

macro_rules! document {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> Uuid {
                self.id
            }
        }
    };
}

/// Generate a new document id.
#[must_use]
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

fn root_folder() -> String {
    ROOT_FOLDER_ID.to_owned()
}

// ── Secrets ──────────────────────────────────────────────────────────

/// Whether a secret is visible to the whole workspace or to one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretType {
    #[default]
    Shared,
    Personal,
}

/// The encrypted key/value pair of a secret, as produced by the client.
///
/// The server never sees plaintext; these strings are copied around
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPayload {
    /// Searchable hash of the secret key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_blind_index: Option<String>,
    pub secret_key_ciphertext: String,
    #[serde(rename = "secretKeyIV")]
    pub secret_key_iv: String,
    pub secret_key_tag: String,
    #[serde(default)]
    pub secret_key_hash: String,
    pub secret_value_ciphertext: String,
    #[serde(rename = "secretValueIV")]
    pub secret_value_iv: String,
    pub secret_value_tag: String,
    #[serde(default)]
    pub secret_value_hash: String,
}

/// The encrypted comment attached to a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretComment {
    #[serde(default)]
    pub secret_comment_ciphertext: String,
    #[serde(default, rename = "secretCommentIV")]
    pub secret_comment_iv: String,
    #[serde(default)]
    pub secret_comment_tag: String,
}

impl SecretComment {
    /// Whether all comment fields are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secret_comment_ciphertext.is_empty()
            && self.secret_comment_iv.is_empty()
            && self.secret_comment_tag.is_empty()
    }
}

/// The live state of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub id: Uuid,
    pub version: u32,
    pub workspace: Uuid,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    #[serde(default)]
    pub user: Option<Uuid>,
    pub environment: String,
    #[serde(default = "root_folder")]
    pub folder: String,
    #[serde(flatten)]
    pub payload: SecretPayload,
    #[serde(flatten)]
    pub comment: SecretComment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Secret, "secrets");

/// A historical state of a secret at one version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    pub id: Uuid,
    pub secret: Uuid,
    pub version: u32,
    pub workspace: Uuid,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    #[serde(default)]
    pub user: Option<Uuid>,
    pub environment: String,
    #[serde(default = "root_folder")]
    pub folder: String,
    pub is_deleted: bool,
    #[serde(flatten)]
    pub payload: SecretPayload,
    pub created_at: DateTime<Utc>,
}

document!(SecretVersion, "secret_versions");

impl SecretVersion {
    /// Record the current state of `secret` as a new, live version.
    #[must_use]
    pub fn of(secret: &Secret) -> Self {
        Self {
            id: new_id(),
            secret: secret.id,
            version: secret.version,
            workspace: secret.workspace,
            secret_type: secret.secret_type,
            user: secret.user,
            environment: secret.environment.clone(),
            folder: secret.folder.clone(),
            is_deleted: false,
            payload: secret.payload.clone(),
            created_at: Utc::now(),
        }
    }
}

// ── Folders ──────────────────────────────────────────────────────────

/// One node of a folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub children: Vec<FolderNode>,
}

/// The live folder tree of one workspace environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub workspace: Uuid,
    pub environment: String,
    pub nodes: FolderNode,
}

document!(Folder, "folders");

/// A recorded shape of a folder subtree.
///
/// `nodes` is rooted at the folder that changed; after a rollback it holds
/// the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderVersion {
    pub id: Uuid,
    pub workspace: Uuid,
    pub environment: String,
    pub nodes: FolderNode,
    pub created_at: DateTime<Utc>,
}

document!(FolderVersion, "folder_versions");

// ── Snapshots ────────────────────────────────────────────────────────

/// A point-in-time bundle of secret versions and one folder version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSnapshot {
    pub id: Uuid,
    pub workspace: Uuid,
    pub environment: String,
    pub folder_id: String,
    pub version: u32,
    pub secret_versions: Vec<Uuid>,
    #[serde(default)]
    pub folder_version: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(SecretSnapshot, "secret_snapshots");

// ── Audit ────────────────────────────────────────────────────────────

/// One old/new version pair touched by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersionChange {
    #[serde(default)]
    pub old_secret_version: Option<Uuid>,
    pub new_secret_version: Uuid,
}

/// What an action touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    #[serde(default)]
    pub secret_versions: Vec<SecretVersionChange>,
}

/// A single audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: Uuid,
    pub name: String,
    pub workspace: Uuid,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub service_account: Option<Uuid>,
    #[serde(default)]
    pub service_token_data: Option<Uuid>,
    #[serde(default)]
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
}

document!(Action, "actions");

/// An audit log record grouping the actions of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: Uuid,
    pub workspace: Uuid,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub service_account: Option<Uuid>,
    #[serde(default)]
    pub service_token_data: Option<Uuid>,
    pub action_names: Vec<String>,
    pub actions: Vec<Uuid>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

document!(Log, "logs");

// ── Principals ───────────────────────────────────────────────────────

/// A human member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

document!(User, "users");

/// A machine identity scoped to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub id: Uuid,
    pub name: String,
    pub workspace: Uuid,
    pub created_at: DateTime<Utc>,
}

document!(ServiceAccount, "service_accounts");

/// Metadata of a service token (never the token itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTokenData {
    pub id: Uuid,
    pub name: String,
    pub workspace: Uuid,
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

document!(ServiceTokenData, "service_tokens");

/// An API key, stored by SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub user: Uuid,
    pub created_at: DateTime<Utc>,
}

document!(ApiKey, "api_keys");

/// Who performed a write, for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    ServiceAccount(Uuid),
    ServiceToken(Uuid),
}

impl Actor {
    /// The user id, if the actor is a user.
    #[must_use]
    pub fn user(self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(id),
            Self::ServiceAccount(_) | Self::ServiceToken(_) => None,
        }
    }

    /// The service account id, if the actor is a service account.
    #[must_use]
    pub fn service_account(self) -> Option<Uuid> {
        match self {
            Self::ServiceAccount(id) => Some(id),
            Self::User(_) | Self::ServiceToken(_) => None,
        }
    }

    /// The service token id, if the actor is a service token.
    #[must_use]
    pub fn service_token(self) -> Option<Uuid> {
        match self {
            Self::ServiceToken(id) => Some(id),
            Self::User(_) | Self::ServiceAccount(_) => None,
        }
    }
}
