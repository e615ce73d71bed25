use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::state::Rooms;

pub mod music;
pub mod rooms;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", rooms::router().merge(music::router()))
        .nest("/ws",  ws::router())
}

async fn health(Extension(rooms): Extension<Rooms>) -> Json<Value> {
    Json(json!({ "status": "ok", "rooms": rooms.len().await }))
}
