//! Audit actions and logs.
//!
//! Every secret write records one [`Action`] describing the secret versions it
//! touched and one [`Log`] grouping the actions of the request. Reading logs
//! back resolves the referenced actions and principals inline.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{
    Action, ActionPayload, Actor, Log, SecretVersionChange, ServiceAccount, ServiceTokenData, User,
    new_id,
};
use crate::query::Pagination;
use crate::store::{DocumentStore, FindOptions};

/// Action name recorded when secrets are added.
pub const ACTION_ADD_SECRETS: &str = "addSecrets";
/// Action name recorded when a secret is updated.
pub const ACTION_UPDATE_SECRETS: &str = "updateSecrets";
/// Action name recorded when a secret is deleted.
pub const ACTION_DELETE_SECRETS: &str = "deleteSecrets";

/// Channel stamped on logs written through the HTTP API.
pub const CHANNEL_API: &str = "api";

/// Record a single action and the log that wraps it.
///
/// # Errors
///
/// Returns a store error.
pub async fn record_action(
    store: &DocumentStore,
    actor: Actor,
    workspace: Uuid,
    name: &str,
    secret_versions: Vec<SecretVersionChange>,
) -> Result<Log, ServiceError> {
    let now = Utc::now();
    let action = Action {
        id: new_id(),
        name: name.to_owned(),
        workspace,
        user: actor.user(),
        service_account: actor.service_account(),
        service_token_data: actor.service_token(),
        payload: ActionPayload { secret_versions },
        created_at: now,
    };
    store.collection::<Action>().insert_one(&action).await?;

    let log = Log {
        id: new_id(),
        workspace,
        user: actor.user(),
        service_account: actor.service_account(),
        service_token_data: actor.service_token(),
        action_names: vec![action.name.clone()],
        actions: vec![action.id],
        channel: CHANNEL_API.to_owned(),
        ip_address: None,
        created_at: now,
    };
    store.collection::<Log>().insert_one(&log).await?;

    debug!(workspace = %workspace, action = name, log_id = %log.id, "audit log recorded");
    Ok(log)
}

/// Filters for [`get_workspace_logs`].
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Only logs written by this user.
    pub user_id: Option<Uuid>,
    /// Comma-separated action names; a log matches if it carries any of them.
    pub action_names: Option<String>,
    /// Newest first instead of oldest first.
    pub recent_first: bool,
    pub page: Pagination,
}

impl LogQuery {
    /// Interpret the raw `sortBy` query value. Only `recent` changes the order.
    #[must_use]
    pub fn with_sort_by(mut self, sort_by: Option<&str>) -> Self {
        self.recent_first = sort_by == Some("recent");
        self
    }
}

/// A log with its actions and principals resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogView {
    pub id: Uuid,
    pub workspace: Uuid,
    pub user: Option<User>,
    pub service_account: Option<ServiceAccount>,
    pub service_token_data: Option<ServiceTokenData>,
    pub action_names: Vec<String>,
    pub actions: Vec<Action>,
    pub channel: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

async fn populate(store: &DocumentStore, log: Log) -> Result<LogView, ServiceError> {
    let actions = store.collection::<Action>().find_by_ids(&log.actions).await?;
    let user = match log.user {
        Some(id) => store.collection::<User>().find_by_id(id).await?,
        None => None,
    };
    let service_account = match log.service_account {
        Some(id) => store.collection::<ServiceAccount>().find_by_id(id).await?,
        None => None,
    };
    let service_token_data = match log.service_token_data {
        Some(id) => store.collection::<ServiceTokenData>().find_by_id(id).await?,
        None => None,
    };

    Ok(LogView {
        id: log.id,
        workspace: log.workspace,
        user,
        service_account,
        service_token_data,
        action_names: log.action_names,
        actions,
        channel: log.channel,
        ip_address: log.ip_address,
        created_at: log.created_at,
    })
}

/// Logs of a workspace, filtered, sorted and paginated per `query`.
///
/// # Errors
///
/// Returns a store error.
pub async fn get_workspace_logs(
    store: &DocumentStore,
    workspace: Uuid,
    query: &LogQuery,
) -> Result<Vec<LogView>, ServiceError> {
    // An empty filter matches everything; otherwise segments are kept
    // verbatim, empty ones included.
    let wanted: Option<HashSet<&str>> = query
        .action_names
        .as_deref()
        .filter(|names| !names.is_empty())
        .map(|names| names.split(',').collect());

    let recent_first = query.recent_first;
    let options = FindOptions::default()
        .sort_by(move |a: &Log, b: &Log| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            if recent_first { ord.reverse() } else { ord }
        })
        .skip(query.page.skip)
        .limit(query.page.limit);

    let logs = store
        .collection::<Log>()
        .find_with(
            |log| {
                log.workspace == workspace
                    && query.user_id.is_none_or(|u| log.user == Some(u))
                    && wanted.as_ref().is_none_or(|names| {
                        log.action_names.iter().any(|n| names.contains(n.as_str()))
                    })
            },
            options,
        )
        .await?;

    let mut views = Vec::with_capacity(logs.len());
    for log in logs {
        views.push(populate(store, log).await?);
    }
    Ok(views)
}
