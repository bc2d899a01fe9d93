//! Integration tests for the whitelist API
//!
//! Drive the full router (middleware included) in-process, over both
//! document store backends.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use presale_admin::common::StoreBackend;
use presale_admin::whitelist::ProvisionConfig;
use presale_admin::{
    api::open_document_store, create_router, AppState, MemoryDocumentStore, OnStoreError,
    WhitelistStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TABLE: &str = "presale-whitelist";

fn fast_provisioning() -> ProvisionConfig {
    ProvisionConfig {
        poll_interval: Duration::from_millis(1),
        max_polls: 10,
    }
}

/// Router over a memory store whose table takes a few polls to activate
fn memory_app(store: MemoryDocumentStore, policy: OnStoreError) -> Router {
    let whitelist =
        WhitelistStore::new(Arc::new(store), TABLE).with_provisioning(fast_provisioning());
    create_router(AppState::new(whitelist, policy))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Add, repeat add, remove, repeat remove
async fn assert_single_address_lifecycle(app: &Router) {
    let (status, body) = call(app, "POST", "/whitelist/add", Some(json!({"address": "W1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["address"], "W1");
    assert_eq!(body["user"]["allocation"], 0);
    assert_eq!(body["user"]["email"], "");
    assert_eq!(body["user"]["status"], "Active");

    let (status, body) = call(app, "POST", "/whitelist/add", Some(json!({"address": "W1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Address is already whitelisted");

    let (status, body) = call(app, "DELETE", "/whitelist/remove", Some(json!({"address": "W1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["address"], "W1");

    let (status, body) = call(app, "DELETE", "/whitelist/remove", Some(json!({"address": "W1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Address is not whitelisted");
}

#[tokio::test]
async fn test_lifecycle_over_memory_store() {
    let store = MemoryDocumentStore::new().with_provisioning_delay(3);
    let app = memory_app(store, OnStoreError::ReturnFallback);

    assert_single_address_lifecycle(&app).await;
}

#[tokio::test]
async fn test_lifecycle_over_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_document_store(&StoreBackend::Sqlite(dir.path().join("presale.db"))).unwrap();
    let whitelist = WhitelistStore::new(store, TABLE).with_provisioning(fast_provisioning());
    let app = create_router(AppState::new(whitelist, OnStoreError::Propagate));

    assert_single_address_lifecycle(&app).await;
}

#[tokio::test]
async fn test_list_tracks_adds_and_removes() {
    let app = memory_app(MemoryDocumentStore::new(), OnStoreError::ReturnFallback);

    for address in ["A1", "A2", "A3"] {
        let (status, _) = call(&app, "POST", "/whitelist/add", Some(json!({"address": address}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = call(&app, "GET", "/whitelist", None).await;
    let mut ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["A1", "A2", "A3"]);

    call(&app, "DELETE", "/whitelist/remove", Some(json!({"address": "A2"}))).await;

    let (_, body) = call(&app, "GET", "/whitelist", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bulk_add_with_repeats_in_batch() {
    let app = memory_app(MemoryDocumentStore::new(), OnStoreError::ReturnFallback);

    let (status, body) = call(
        &app,
        "POST",
        "/whitelist/bulk-add",
        Some(json!({"addresses": ["X", "Y", "X"], "allocation": 10})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["addedCount"], 2);
    assert_eq!(body["skippedCount"], 1);
    assert_eq!(body["skippedAddresses"], json!(["X"]));

    let (_, x) = call(&app, "GET", "/whitelist/X", None).await;
    assert_eq!(x["allocation"], 10);
    let (_, y) = call(&app, "GET", "/whitelist/Y", None).await;
    assert_eq!(y["allocation"], 10);

    // Already stored addresses are skipped on a later batch
    let (_, body) = call(
        &app,
        "POST",
        "/whitelist/bulk-add",
        Some(json!({"addresses": ["Y", "Z"]})),
    )
    .await;
    assert_eq!(body["addedCount"], 1);
    assert_eq!(body["skippedAddresses"], json!(["Y"]));
    assert_eq!(body["users"][0]["allocation"], 0);
}

#[tokio::test]
async fn test_bulk_added_entries_can_be_removed() {
    let app = memory_app(MemoryDocumentStore::new(), OnStoreError::Propagate);
    let long = "b".repeat(500);

    let (status, body) = call(
        &app,
        "POST",
        "/whitelist/bulk-add",
        Some(json!({"addresses": ["two words", long, "W9"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["addedCount"], 1);
    assert_eq!(body["skippedCount"], 2);

    // Skipped addresses were never stored, and remove rejects them up front
    for address in ["two words", long.as_str()] {
        let (status, _) = call(
            &app,
            "DELETE",
            "/whitelist/remove",
            Some(json!({"address": address})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = call(&app, "DELETE", "/whitelist/remove", Some(json!({"address": "W9"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/whitelist", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_outage_degrades_to_fallback() {
    let store = MemoryDocumentStore::new();
    let app = memory_app(store.clone(), OnStoreError::ReturnFallback);

    call(&app, "POST", "/whitelist/add", Some(json!({"address": "REAL"}))).await;
    store.set_available(false);

    let (status, body) = call(&app, "GET", "/whitelist", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row["address"] != "REAL"));

    let (status, body) = call(
        &app,
        "POST",
        "/whitelist/bulk-add",
        Some(json!({"addresses": ["X", "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["addedCount"], 1);
    assert_eq!(body["skippedCount"], 1);

    // Nothing written during the outage reaches the store
    store.set_available(true);
    let (_, body) = call(&app, "GET", "/whitelist", None).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["address"], "REAL");
}

#[tokio::test]
async fn test_outage_with_propagate_policy() {
    let store = MemoryDocumentStore::new();
    store.set_available(false);
    let app = memory_app(store, OnStoreError::Propagate);

    for (method, uri, body) in [
        ("GET", "/whitelist", None),
        ("GET", "/whitelist/W1", None),
        ("POST", "/whitelist/add", Some(json!({"address": "W1"}))),
        ("POST", "/whitelist/bulk-add", Some(json!({"addresses": ["W1"]}))),
        ("DELETE", "/whitelist/remove", Some(json!({"address": "W1"}))),
        ("PUT", "/whitelist/update", Some(json!({"address": "W1", "allocation": 1}))),
    ] {
        let (status, body) = call(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{} {}", method, uri);
        assert_eq!(body["code"], "STORAGE_ERROR");
    }
}
