//! # HTTP Server
//!
//! Mounts the resource and index routers under `/api/v1` and serves them
//! until Ctrl-C. Storage is closed once the last connection has drained.
//!
//! A trailing slash is trimmed before routing, so `/api/v1/states/` and
//! `/api/v1/states` reach the same handler.

use std::sync::Arc;

use axum::extract::Request;
use axum::{http::StatusCode, response::IntoResponse, Json, Router, ServiceExt};
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::resource::ErrorResponse;
use crate::storage::StorageEngine;

use super::config::HttpServerConfig;
use super::index_routes::index_routes;
use super::resource_routes::{resource_routes, ApiState};

/// Prefix every API route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// The routed application, path normalization outermost
pub type App = NormalizePath<Router>;

pub struct HttpServer {
    config: HttpServerConfig,
    engine: Arc<StorageEngine>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, engine: Arc<StorageEngine>) -> Self {
        Self { config, engine }
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the application (for testing)
    pub fn router(&self) -> App {
        build_router(&self.config, self.engine.clone())
    }

    /// Serves until Ctrl-C, then saves and closes storage.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let app = self.router();
        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;

        info!(
            %addr,
            backend = self.engine.backend_name(),
            entities = self.engine.count_all(),
            "hbnb API listening on http://{}{}",
            addr,
            API_PREFIX
        );

        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        close_engine(self.engine).map_err(std::io::Error::other)
    }
}

/// Builds the full application.
///
/// Path normalization wraps the router instead of being one of its layers;
/// router layers only run after a route has matched.
pub fn build_router(config: &HttpServerConfig, engine: Arc<StorageEngine>) -> App {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = Router::new()
        .merge(index_routes())
        .merge(resource_routes())
        .with_state(ApiState::new(engine));

    let router = Router::new()
        .nest(API_PREFIX, api)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::not_found()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn close_engine(engine: Arc<StorageEngine>) -> crate::storage::StorageResult<()> {
    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.close(),
        // A handle is still held elsewhere; flush without releasing it.
        Err(shared) => shared.save(),
    }
}
