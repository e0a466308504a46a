//! Integration tests for the workspace HTTP routes.

#![allow(clippy::unwrap_used)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use keyhold_core::DocumentStore;
use keyhold_core::models::Secret;
use keyhold_server::auth::register_api_key;
use keyhold_server::reporting::{ErrorContext, ErrorReporter};
use keyhold_server::routes;
use keyhold_server::state::AppState;
use keyhold_storage::MemoryBackend;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const API_KEY: &str = "kh_test_key";
const EMAIL: &str = "owner@example.com";

/// Reporter that records every report for later inspection.
#[derive(Default)]
struct CapturingReporter {
    reports: Mutex<Vec<(ErrorContext, String)>>,
}

impl ErrorReporter for CapturingReporter {
    fn report(&self, ctx: &ErrorContext, error: &(dyn Error + 'static)) {
        self.reports
            .lock()
            .unwrap()
            .push((ctx.clone(), error.to_string()));
    }
}

struct Harness {
    app: Router,
    store: DocumentStore,
    reporter: Arc<CapturingReporter>,
    workspace: Uuid,
}

impl Harness {
    async fn new() -> Self {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        register_api_key(&store, "test", API_KEY, EMAIL).await.unwrap();
        let reporter = Arc::new(CapturingReporter::default());
        let state = Arc::new(AppState::new(store.clone(), reporter.clone()));
        Self {
            app: routes::router(state),
            store,
            reporter,
            workspace: Uuid::now_v7(),
        }
    }

    fn url(&self, rest: &str) -> String {
        format!("/api/v1/workspace/{}{rest}", self.workspace)
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-API-Key", API_KEY);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn add_secret(&self, value: &str) -> Value {
        let (status, body) = self
            .post(
                &self.url("/secrets"),
                json!({
                    "environment": "dev",
                    "secrets": [secret_fields(value)],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["secrets"][0].clone()
    }

    fn reports(&self) -> Vec<(ErrorContext, String)> {
        self.reporter.reports.lock().unwrap().clone()
    }
}

fn secret_fields(value: &str) -> Value {
    json!({
        "type": "shared",
        "secretKeyCiphertext": "key-ct",
        "secretKeyIV": "key-iv",
        "secretKeyTag": "key-tag",
        "secretValueCiphertext": value,
        "secretValueIV": format!("{value}-iv"),
        "secretValueTag": format!("{value}-tag"),
        "secretCommentCiphertext": "comment",
        "secretCommentIV": "comment-iv",
        "secretCommentTag": "comment-tag",
    })
}

// ── Auth ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_needs_no_key() {
    let h = Harness::new().await;
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn workspace_routes_require_key() {
    let h = Harness::new().await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(h.url("/secret-snapshots?environment=dev"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(h.url("/secret-snapshots?environment=dev"))
                .header("X-API-Key", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "invalid API key");
}

// ── Snapshots ────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshots_list_newest_first_and_count() {
    let h = Harness::new().await;
    for value in ["a", "b", "c"] {
        h.add_secret(value).await;
    }

    let (status, body) = h.get(&h.url("/secret-snapshots?environment=dev")).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<u64> = body["secretSnapshots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["version"].as_u64().unwrap())
        .collect();
    assert_eq!(versions, vec![3, 2, 1]);

    let (_, body) = h
        .get(&h.url("/secret-snapshots?environment=dev&offset=1&limit=1"))
        .await;
    assert_eq!(body["secretSnapshots"].as_array().unwrap().len(), 1);
    assert_eq!(body["secretSnapshots"][0]["version"], 2);

    // Non-numeric pagination values are ignored.
    let (_, body) = h
        .get(&h.url("/secret-snapshots?environment=dev&offset=abc&limit=xyz"))
        .await;
    assert_eq!(body["secretSnapshots"].as_array().unwrap().len(), 3);

    let (status, body) = h.get(&h.url("/secret-snapshots/count?environment=dev")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (_, body) = h
        .get(&h.url("/secret-snapshots/count?environment=dev&folderId=elsewhere"))
        .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn snapshot_listing_failures_are_fixed_400() {
    let h = Harness::new().await;

    let (status, body) = h
        .get("/api/v1/workspace/not-a-uuid/secret-snapshots?environment=dev")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Failed to get secret snapshots" }));

    let (status, body) = h
        .get(&h.url("/secret-snapshots?environment=dev&offset=-1"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to get secret snapshots");

    let (status, body) = h.get(&h.url("/secret-snapshots/count")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to count number of secret snapshots");

    let reports = h.reports();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|(ctx, _)| ctx.email == EMAIL));
}

#[tokio::test]
async fn empty_folder_id_means_root() {
    let h = Harness::new().await;
    h.add_secret("a").await;

    let (status, body) = h
        .get(&h.url("/secret-snapshots?environment=dev&folderId="))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["secretSnapshots"].as_array().unwrap().len(), 1);

    let (status, body) = h
        .get(&h.url("/secret-snapshots/count?environment=dev&folderId="))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn malformed_query_is_fixed_400_and_reported() {
    let h = Harness::new().await;

    let (status, body) = h
        .get(&h.url("/secret-snapshots?environment=dev&environment=prod"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Failed to get secret snapshots" }));

    let (status, body) = h
        .get(&h.url("/secret-snapshots/count?environment=dev&environment=prod"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Failed to count number of secret snapshots" }));

    let (status, body) = h.get(&h.url("/logs?sortBy=recent&sortBy=oldest")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Failed to get workspace logs" }));

    let reports = h.reports();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|(ctx, _)| ctx.email == EMAIL));
}

// ── Rollback ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rollback_restores_values_and_clears_comments() {
    let h = Harness::new().await;
    let secret = h.add_secret("original").await;
    let id = secret["id"].as_str().unwrap().to_owned();

    let (status, _) = h
        .send(
            Method::PATCH,
            &h.url(&format!("/secrets/{id}")),
            Some(json!({
                "secretKeyCiphertext": "key-ct",
                "secretKeyIV": "key-iv",
                "secretKeyTag": "key-tag",
                "secretValueCiphertext": "changed",
                "secretValueIV": "changed-iv",
                "secretValueTag": "changed-tag",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .post(
            &h.url("/secret-snapshots/rollback"),
            json!({ "version": 1, "environment": "dev" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let restored = &body["secrets"][0];
    assert_eq!(restored["id"], id.as_str());
    assert_eq!(restored["version"], 3);
    assert_eq!(restored["secretValueCiphertext"], "original");
    assert_eq!(restored["secretValueIV"], "original-iv");
    assert_eq!(restored["secretCommentCiphertext"], "");

    let live = h
        .store
        .collection::<Secret>()
        .find_by_id(Uuid::parse_str(&id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.payload.secret_value_ciphertext, "original");

    let (_, body) = h.get(&h.url("/secret-snapshots/count?environment=dev")).await;
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn rollback_of_missing_snapshot_changes_nothing() {
    let h = Harness::new().await;
    h.add_secret("keep").await;
    let before = h.store.collection::<Secret>().find(|_| true).await.unwrap();

    let (status, body) = h
        .post(
            &h.url("/secret-snapshots/rollback"),
            json!({ "version": 99, "environment": "dev" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "Failed to roll back secret snapshot" }));

    let after = h.store.collection::<Secret>().find(|_| true).await.unwrap();
    assert_eq!(before, after);

    let reports = h.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0.email, EMAIL);
    assert!(reports[0].1.contains("not found"));
}

#[tokio::test]
async fn rollback_with_bad_body_is_fixed_400() {
    let h = Harness::new().await;
    let (status, body) = h
        .post(&h.url("/secret-snapshots/rollback"), json!({ "environment": "dev" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to roll back secret snapshot");
}

// ── Folders ──────────────────────────────────────────────────────────

#[tokio::test]
async fn folder_snapshots_are_scoped() {
    let h = Harness::new().await;
    let (status, body) = h
        .post(
            &h.url("/folders"),
            json!({ "environment": "dev", "folderName": "api" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let folder_id = body["folder"]["id"].as_str().unwrap().to_owned();

    let (status, _) = h
        .post(
            &h.url("/secrets"),
            json!({
                "environment": "dev",
                "folderId": folder_id,
                "secrets": [secret_fields("nested")],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = h
        .get(&h.url(&format!("/secret-snapshots/count?environment=dev&folderId={folder_id}")))
        .await;
    assert_eq!(body["count"], 1);

    let (status, body) = h
        .post(
            &h.url("/folders"),
            json!({ "environment": "dev", "folderName": "api" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to create folder");
}

// ── Logs ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn logs_filter_by_action_names_and_sort() {
    let h = Harness::new().await;
    let secret = h.add_secret("v1").await;
    let id = secret["id"].as_str().unwrap().to_owned();
    let (status, _) = h
        .send(Method::DELETE, &h.url(&format!("/secrets/{id}")), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.get(&h.url("/logs?actionNames=addSecrets")).await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["user"]["email"], EMAIL);
    assert_eq!(logs[0]["actions"][0]["name"], "addSecrets");

    let (_, body) = h
        .get(&h.url("/logs?actionNames=addSecrets,deleteSecrets&sortBy=recent"))
        .await;
    let names: Vec<&str> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["actionNames"][0].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["deleteSecrets", "addSecrets"]);

    let (_, body) = h.get(&h.url("/logs?actionNames=login,logout")).await;
    assert!(body["logs"].as_array().unwrap().is_empty());

    let (status, body) = h.get(&h.url("/logs?userId=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to get workspace logs");
}

#[tokio::test]
async fn empty_log_filters_are_ignored() {
    let h = Harness::new().await;
    h.add_secret("v1").await;

    for query in ["/logs", "/logs?actionNames=", "/logs?userId=", "/logs?userId=&actionNames="] {
        let (status, body) = h.get(&h.url(query)).await;
        assert_eq!(status, StatusCode::OK, "{query}: {body}");
        assert_eq!(body["logs"].as_array().unwrap().len(), 1, "{query}");
    }
    assert!(h.reports().is_empty());
}

#[tokio::test]
async fn unknown_secret_is_fixed_400() {
    let h = Harness::new().await;
    let (status, body) = h
        .send(
            Method::DELETE,
            &h.url(&format!("/secrets/{}", Uuid::now_v7())),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Failed to delete secret");
}
