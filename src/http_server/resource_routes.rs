//! Resource HTTP Routes
//!
//! One sub-router per entity kind. Root kinds answer on `/{collection}`,
//! child kinds on `/{parent collection}/:id/{collection}`, and every kind
//! on `/{collection}/:id`. The kind reaches the handlers as an
//! [`Extension`], so all five sub-routers share the same handler functions.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::model::{Entity, EntityKind};
use crate::resource::{RequestBody, ResourceHandler, ResourceResult};
use crate::storage::StorageEngine;

// ==================
// Shared State
// ==================

/// State shared by every API handler
#[derive(Debug, Clone)]
pub struct ApiState {
    pub engine: Arc<StorageEngine>,
}

impl ApiState {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    fn handler(&self, kind: EntityKind) -> ResourceHandler {
        ResourceHandler::new(self.engine.clone(), kind)
    }
}

// ==================
// Router
// ==================

/// Routes for every entity kind
pub fn resource_routes() -> Router<ApiState> {
    EntityKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(kind_routes(kind)))
}

fn kind_routes(kind: EntityKind) -> Router<ApiState> {
    let schema = kind.schema();
    let collection = schema.collection;

    let router = match schema.parent {
        None => Router::new().route(
            &format!("/{}", collection),
            get(list_root).post(create_root),
        ),
        Some(relation) => Router::new().route(
            &format!("/{}/:id/{}", relation.target.collection(), collection),
            get(list_children).post(create_child),
        ),
    };

    router
        .route(
            &format!("/{}/:id", collection),
            get(get_one).put(update_one).delete(delete_one),
        )
        .layer(Extension(kind))
}

// ==================
// Handlers
// ==================

fn render(entities: Vec<Entity>) -> Json<Vec<Value>> {
    Json(entities.iter().map(Entity::to_json).collect())
}

fn request_body(headers: &HeaderMap, bytes: Bytes) -> RequestBody {
    let content_type = headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    RequestBody::new(content_type, bytes.to_vec())
}

async fn list_root(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
) -> ResourceResult<Json<Vec<Value>>> {
    state.handler(kind).list(None).map(render)
}

async fn list_children(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    Path(parent_id): Path<String>,
) -> ResourceResult<Json<Vec<Value>>> {
    state.handler(kind).list(Some(&parent_id)).map(render)
}

async fn get_one(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
) -> ResourceResult<Json<Value>> {
    let entity = state.handler(kind).get(&id)?;
    Ok(Json(entity.to_json()))
}

async fn create_root(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    headers: HeaderMap,
    body: Bytes,
) -> ResourceResult<impl IntoResponse> {
    let entity = state
        .handler(kind)
        .create(None, &request_body(&headers, body))?;
    Ok((StatusCode::CREATED, Json(entity.to_json())))
}

async fn create_child(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    Path(parent_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ResourceResult<impl IntoResponse> {
    let entity = state
        .handler(kind)
        .create(Some(&parent_id), &request_body(&headers, body))?;
    Ok((StatusCode::CREATED, Json(entity.to_json())))
}

async fn update_one(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ResourceResult<Json<Value>> {
    let entity = state
        .handler(kind)
        .update(&id, &request_body(&headers, body))?;
    Ok(Json(entity.to_json()))
}

async fn delete_one(
    State(state): State<ApiState>,
    Extension(kind): Extension<EntityKind>,
    Path(id): Path<String>,
) -> ResourceResult<Json<Value>> {
    state.handler(kind).delete(&id)?;
    Ok(Json(json!({})))
}
