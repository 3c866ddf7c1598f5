use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use imagebed_store::ImageStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod flash;
pub mod routes_images;
pub mod templates;

use auth::SessionKey;
use templates::Templates;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Filesystem image store
    pub store: Arc<ImageStore>,
    /// Signs and verifies session cookies
    pub session_key: Arc<SessionKey>,
    /// Compiled HTML templates
    pub templates: Arc<Templates>,
}

impl AppContext {
    /// Open the image store and build everything request handlers need.
    pub fn new(config: Config) -> Result<Self> {
        let store = ImageStore::open(
            &config.storage.upload_dir,
            config.storage.extensions(),
            config.storage.max_file_size,
        )
        .with_context(|| {
            format!(
                "Failed to open upload directory {:?}",
                config.storage.upload_dir
            )
        })?;

        let session_key = SessionKey::from_config(&config.auth);
        let templates = Templates::new().context("Failed to compile templates")?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            session_key: Arc::new(session_key),
            templates: Arc::new(templates),
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let body_limit = usize::try_from(ctx.store.max_file_size().saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    // Login-protected routes
    let protected_routes = Router::new()
        .route("/", get(routes_images::index))
        .route(
            "/upload",
            post(routes_images::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/delete/:filename", post(routes_images::delete_image))
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_login,
        ));

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/images/:filename", get(routes_images::serve_image))
        .route("/download/:filename", get(routes_images::download_image));

    public_routes
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config)?;
    tracing::info!(
        "Serving images from {} ({} extensions, max {} bytes)",
        ctx.store.root().display(),
        ctx.store.allowed_extensions().len(),
        ctx.store.max_file_size()
    );

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
