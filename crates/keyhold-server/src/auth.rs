//! API key authentication.
//!
//! Callers send `X-API-Key: <key>`. Keys are SHA-256 hashed before storage
//! and looked up by hash; the plaintext is never persisted.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use keyhold_core::models::{Actor, ApiKey, User, new_id};
use keyhold_core::{DocumentStore, StoreError};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Id of the API key used.
    pub key_id: Uuid,
    /// The user the key belongs to.
    pub user_id: Uuid,
    /// The user's email, attached to error reports.
    pub email: String,
}

impl Principal {
    /// The audit actor for writes made by this principal.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::User(self.user_id)
    }
}

/// Hash an API key with SHA-256 for storage/lookup.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Register `key` for the user with `email`, creating the user if needed.
/// Registering a key that already exists returns its current principal.
///
/// # Errors
///
/// Returns a store error.
pub async fn register_api_key(
    store: &DocumentStore,
    name: &str,
    key: &str,
    email: &str,
) -> Result<Principal, StoreError> {
    let users = store.collection::<User>();
    let user = match users.find_one(|u| u.email == email).await? {
        Some(user) => user,
        None => {
            let user = User {
                id: new_id(),
                email: email.to_owned(),
                first_name: String::new(),
                last_name: String::new(),
                created_at: Utc::now(),
            };
            users.insert_one(&user).await?;
            user
        }
    };

    let key_hash = hash_api_key(key);
    let keys = store.collection::<ApiKey>();
    let api_key = match keys.find_one(|k| k.key_hash == key_hash).await? {
        Some(existing) => existing,
        None => {
            let api_key = ApiKey {
                id: new_id(),
                name: name.to_owned(),
                key_hash,
                user: user.id,
                created_at: Utc::now(),
            };
            keys.insert_one(&api_key).await?;
            info!(key_id = %api_key.id, email, "api key registered");
            api_key
        }
    };

    let owner = if api_key.user == user.id {
        user
    } else {
        users.find_by_id(api_key.user).await?.unwrap_or(user)
    };
    Ok(Principal {
        key_id: api_key.id,
        user_id: owner.id,
        email: owner.email,
    })
}

/// Resolve a presented key to its principal. `None` if the key or its user
/// is unknown.
///
/// # Errors
///
/// Returns a store error.
pub async fn resolve_api_key(
    store: &DocumentStore,
    key: &str,
) -> Result<Option<Principal>, StoreError> {
    let key_hash = hash_api_key(key);
    let Some(api_key) = store
        .collection::<ApiKey>()
        .find_one(|k| k.key_hash == key_hash)
        .await?
    else {
        return Ok(None);
    };
    let Some(user) = store.collection::<User>().find_by_id(api_key.user).await? else {
        return Ok(None);
    };
    Ok(Some(Principal {
        key_id: api_key.id,
        user_id: user.id,
        email: user.email,
    }))
}

/// Middleware that validates the `X-API-Key` header and injects the
/// [`Principal`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(key) = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        return ApiError::Unauthorized("missing X-API-Key header".to_owned()).into_response();
    };

    match resolve_api_key(&state.store, &key).await {
        Ok(Some(principal)) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Ok(None) => ApiError::Unauthorized("invalid API key".to_owned()).into_response(),
        Err(e) => {
            warn!(error = %e, "api key lookup failed");
            ApiError::Internal("failed to authenticate request".to_owned()).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use keyhold_storage::MemoryBackend;

    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn register_then_resolve() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let registered = register_api_key(&store, "root", "kh_secret", "ops@example.com")
            .await
            .unwrap();
        let again = register_api_key(&store, "root", "kh_secret", "ops@example.com")
            .await
            .unwrap();
        assert_eq!(registered, again);

        let resolved = resolve_api_key(&store, "kh_secret").await.unwrap().unwrap();
        assert_eq!(resolved, registered);
        assert!(resolve_api_key(&store, "nope").await.unwrap().is_none());

        let stored = store.collection::<ApiKey>().find(|_| true).await.unwrap();
        assert!(stored.iter().all(|k| k.key_hash != "kh_secret"));
    }

    #[tokio::test]
    async fn reregistering_under_another_email_keeps_the_key_owner() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let owner = register_api_key(&store, "root", "kh_shared", "ops@example.com")
            .await
            .unwrap();
        let again = register_api_key(&store, "root", "kh_shared", "dev@example.com")
            .await
            .unwrap();

        assert_eq!(again, owner);
        assert_eq!(again.email, "ops@example.com");
        let resolved = resolve_api_key(&store, "kh_shared").await.unwrap().unwrap();
        assert_eq!(resolved, again);
    }
}
