//! HTTP surface of the slicer
//!
//! The workspace is created on the first request that needs it. Concurrent
//! first requests wait on the same initialization; once it succeeds every
//! later request shares it. A failed initialization is not cached, so the
//! next request retries.

pub mod error;
pub mod handlers;
pub mod types;

pub use error::{ApiError, ApiResult};

use crate::config::ApplicationConfig;
use crate::engine::Workspace;
use crate::error::{Error, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

type Initializer = dyn Fn(&ApplicationConfig) -> Result<Workspace> + Send + Sync;

/// Shared state of the HTTP server
pub struct AppState {
    config: ApplicationConfig,
    workspace: OnceCell<Arc<Workspace>>,
    initializer: Box<Initializer>,
}

impl AppState {
    /// State whose workspace is built from `config` on first use
    pub fn new(config: ApplicationConfig) -> Self {
        Self::with_initializer(config, Workspace::from_config)
    }

    /// State with a custom workspace factory
    pub fn with_initializer<F>(config: ApplicationConfig, initializer: F) -> Self
    where
        F: Fn(&ApplicationConfig) -> Result<Workspace> + Send + Sync + 'static,
    {
        Self {
            config,
            workspace: OnceCell::new(),
            initializer: Box::new(initializer),
        }
    }

    /// State around an already built workspace
    pub fn with_workspace(config: ApplicationConfig, workspace: Workspace) -> Self {
        Self {
            config,
            workspace: OnceCell::new_with(Some(Arc::new(workspace))),
            initializer: Box::new(Workspace::from_config),
        }
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Whether the workspace has been created
    pub fn is_initialized(&self) -> bool {
        self.workspace.initialized()
    }

    /// Shared workspace, created on first call
    pub async fn workspace(&self) -> Result<Arc<Workspace>> {
        self.workspace
            .get_or_try_init(|| async {
                info!("Initializing workspace");
                let workspace = (self.initializer)(&self.config)?;
                info!(cubes = workspace.cube_names().len(), "Workspace initialized");
                Ok::<_, Error>(Arc::new(workspace))
            })
            .await
            .cloned()
    }
}

/// CORS layer from configured origins; empty or `*` allows any origin
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/info", get(handlers::info))
        .route("/cubes", get(handlers::list_cubes))
        .route("/cube/{cube}/model", get(handlers::cube_model))
        .route("/cube/{cube}/aggregate", get(handlers::aggregate))
        .route("/cube/{cube}/cell", get(handlers::cell))
        .route(
            "/cube/{cube}/report",
            get(handlers::report).post(handlers::report),
        )
        .route("/cube/{cube}/facts", get(handlers::facts))
        .route("/cube/{cube}/fact/{id}", get(handlers::fact))
        .route("/cube/{cube}/members/{dimension}", get(handlers::members))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
