//! Latest-version lookup for secrets.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::SecretVersion;
use crate::store::DocumentStore;

/// Map each of `secret_ids` to its highest-numbered [`SecretVersion`].
///
/// Ids with no recorded version are absent from the result. Duplicate ids
/// are looked up once.
///
/// # Errors
///
/// Returns a store error.
pub async fn latest_secret_versions(
    store: &DocumentStore,
    secret_ids: &[Uuid],
) -> Result<HashMap<Uuid, SecretVersion>, StoreError> {
    let wanted: HashSet<Uuid> = secret_ids.iter().copied().collect();
    let versions = store
        .collection::<SecretVersion>()
        .find(|v| wanted.contains(&v.secret))
        .await?;

    let mut latest: HashMap<Uuid, SecretVersion> = HashMap::with_capacity(wanted.len());
    for version in versions {
        match latest.get(&version.secret) {
            Some(current) if current.version >= version.version => {}
            _ => {
                latest.insert(version.secret, version);
            }
        }
    }
    Ok(latest)
}
