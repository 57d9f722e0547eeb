//! # HTTP Server Module
//!
//! axum front end over the resource handlers.
//!
//! # Endpoints
//!
//! - `/api/v1/status` - Liveness
//! - `/api/v1/stats` - Entity count per collection
//! - `/api/v1/{collection}[/:id]` - Resource CRUD
//! - `/api/v1/{parent}/:id/{collection}` - Children of a parent
//!
//! Every path is also accepted with a trailing slash.

pub mod config;
pub mod index_routes;
pub mod resource_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use resource_routes::ApiState;
pub use server::{build_router, App, HttpServer, API_PREFIX};
