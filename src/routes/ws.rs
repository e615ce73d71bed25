use axum::{
    extract::{ws::WebSocketUpgrade, Extension, Path, Query},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{not_found, AppResult},
    hub::client,
    room::Role,
    state::{Hub, Rooms},
};

#[derive(Deserialize)] struct WsQuery { user_id: Option<String> }

pub fn router() -> Router {
    Router::new().route("/:room_id", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(q): Query<WsQuery>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
) -> AppResult<Response> {
    let room = rooms.get(&room_id).await.ok_or_else(|| not_found("Room"))?;
    let uid = q
        .user_id
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    // role is fixed for the life of the connection
    let role = if room.is_host(&uid) { Role::Host } else { Role::Listener };

    Ok(ws
        .on_failed_upgrade(|e| tracing::warn!("websocket upgrade failed: {e}"))
        .on_upgrade(move |s| client::serve(s, room_id, uid, role, hub, rooms)))
}
