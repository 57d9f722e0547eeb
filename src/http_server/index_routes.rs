//! Index HTTP Routes
//!
//! Liveness and per-collection counts.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;

use super::resource_routes::ApiState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

pub fn index_routes() -> Router<ApiState> {
    Router::new()
        .route("/status", get(status_handler))
        .route("/stats", get(stats_handler))
}

async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}

async fn stats_handler(State(state): State<ApiState>) -> Json<BTreeMap<&'static str, usize>> {
    Json(state.engine.collection_counts())
}
