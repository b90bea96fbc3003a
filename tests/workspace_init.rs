//! Workspace Initialization Tests
//!
//! The server creates its workspace on first use. These tests cover
//! concurrent first requests, failed initialization and loading a model
//! file from configuration.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use cube_slicer::{
    api::{build_router, AppState},
    config::ApplicationConfig,
    engine::MemoryBrowser,
    Error, Workspace,
};
use serde_json::Value;
use std::{
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tempfile::NamedTempFile;
use tower::ServiceExt;

const MODEL: &str = r#"{
    "cubes": [{"name": "sales", "dimensions": [{"name": "product"}], "measures": [{"name": "amount"}]}],
    "facts": {"sales": [{"id": 1, "product": "tea", "amount": 4}]}
}"#;

fn model_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MODEL.as_bytes()).unwrap();
    file
}

fn empty_workspace() -> cube_slicer::Result<Workspace> {
    Workspace::builder().with_browser(MemoryBrowser::new()).build()
}

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// =============================================================================
// Lazy Initialization
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_share_one_workspace() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let state = Arc::new(AppState::with_initializer(
        ApplicationConfig::default(),
        move |_config| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            empty_workspace()
        },
    ));
    assert!(!state.is_initialized());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.workspace().await.unwrap() })
        })
        .collect();

    let mut workspaces = Vec::new();
    for handle in handles {
        workspaces.push(handle.await.unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(workspaces.iter().all(|ws| Arc::ptr_eq(ws, &workspaces[0])));
    assert!(state.is_initialized());
}

#[tokio::test]
async fn test_failed_initialization_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let state = AppState::with_initializer(ApplicationConfig::default(), move |_config| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(Error::Configuration("model store unavailable".into()))
        } else {
            empty_workspace()
        }
    });

    assert!(matches!(state.workspace().await, Err(Error::Configuration(_))));
    assert!(!state.is_initialized());

    assert!(state.workspace().await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_health_does_not_initialize_workspace() {
    let state = Arc::new(AppState::with_initializer(ApplicationConfig::default(), |_| {
        empty_workspace()
    }));
    let router = build_router(state.clone());

    let (status, _) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!state.is_initialized());

    let (status, _) = get(&router, "/cubes").await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.is_initialized());
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_workspace_loaded_from_config_model() {
    let file = model_file();
    let mut config = ApplicationConfig::default();
    config.workspace.model_path = Some(file.path().to_path_buf());

    let router = build_router(Arc::new(AppState::new(config)));

    let (status, json) = get(&router, "/cube/sales/aggregate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["amount_sum"], 4);
}

#[tokio::test]
async fn test_missing_model_file_is_server_error() {
    let mut config = ApplicationConfig::default();
    config.workspace.model_path = Some("/nonexistent/model.json".into());

    let router = build_router(Arc::new(AppState::new(config)));

    let (status, json) = get(&router, "/cubes").await;
    assert!(status.is_server_error());
    assert_eq!(json["error"], "model_error");

    let (status, _) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn test_workspace_requires_browser() {
    let result = Workspace::builder().build();
    assert!(matches!(result, Err(Error::Configuration(_))));
}
