//! # Server Configuration
//!
//! Router setup and the HTTP server loop.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::error::SyncError;
use crate::handlers;
use crate::orchestrator::SyncOrchestrator;
use crate::platform::GitLabPlatform;
use crate::redelivery::Redeliverer;
use crate::repositories::RepoSyncRepository;
use crate::storage::{HttpObjectStore, MemoryObjectStore, ObjectLayout, ObjectStore, RepoStorage};
use crate::transfer::ScriptTransferTool;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Present when failed notifications should be re-delivered
    pub redeliverer: Option<Arc<Redeliverer>>,
}

impl AppState {
    /// Wire the production collaborators described by `config`.
    pub fn from_config(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
    ) -> Result<Self, SyncError> {
        let retry = config.retry.policy();

        let store: Arc<dyn ObjectStore> = if config.object_store.endpoint.is_empty() {
            warn!("No object store endpoint configured; synced content stays in memory");
            Arc::new(MemoryObjectStore::new())
        } else {
            Arc::new(HttpObjectStore::from_config(&config.object_store)?)
        };

        let orchestrator = SyncOrchestrator::new(
            Arc::new(RepoSyncRepository::new(db)),
            Arc::new(GitLabPlatform::from_config(&config)?),
            RepoStorage::new(store, ObjectLayout::from_config(&config.sync), retry),
            Arc::new(ScriptTransferTool::from_config(&config.sync)),
            config.sync.work_dir.clone(),
            retry,
        );

        Ok(Self {
            redeliverer: Redeliverer::from_config(&config).map(Arc::new),
            orchestrator: Arc::new(orchestrator),
            config,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/webhooks/gitlab",
            post(handlers::webhooks::gitlab_push_hook),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: Arc<AppConfig>,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::webhooks::gitlab_push_hook,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::webhooks::WebhookAcceptResponse,
            crate::handlers::webhooks::GitLabPushHook,
            crate::handlers::webhooks::GitLabProject,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "webhooks", description = "GitLab push hook ingestion"),
    ),
    info(
        title = "reposync",
        description = "Mirrors GitLab repositories into object storage on push",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
