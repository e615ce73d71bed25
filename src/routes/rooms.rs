use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{not_found, AppErr, AppResult, JsonBody},
    room::{Role, Room},
    state::{Hub, Rooms, Tracks},
};

/// Sent to listeners just before a deleted room's connections are closed.
const ROOM_CLOSED: &str = r#"{"type":"room_closed"}"#;

#[derive(Deserialize)]
pub struct CreateRoomInput { name: String }

#[derive(Serialize)]
pub struct CreatedRoom { room_id: String, host_id: String, room_name: String }

#[derive(Deserialize)]
pub struct JoinInput { user_name: String }

#[derive(Serialize)]
pub struct Joined { user_id: String }

#[derive(Deserialize)]
pub struct PlayInput { track_id: String, user_id: String }

#[derive(Deserialize)]
pub struct SeekInput { position: i64, user_id: String }

#[derive(Deserialize)]
pub struct UserInput { user_id: String }

#[derive(Serialize)]
pub struct RoleView { is_host: bool, can_control: bool }

pub fn router() -> Router {
    Router::new()
        .route("/rooms",            post(create))
        .route("/rooms/:id",        get(show).delete(remove))
        .route("/rooms/:id/join",   post(join))
        .route("/rooms/:id/leave",  post(leave))
        .route("/rooms/:id/play",   post(play))
        .route("/rooms/:id/pause",  post(pause))
        .route("/rooms/:id/resume", post(resume))
        .route("/rooms/:id/seek",   post(seek))
        .route("/rooms/:id/role",   get(role))
}

/* ---------------- helpers ---------------- */
async fn lookup(rooms: &Rooms, id: &str) -> AppResult<Arc<Room>> {
    rooms.get(id).await.ok_or_else(|| not_found("Room"))
}

/// Room lookup plus the playback permission check, both ahead of any mutation.
async fn controlled(rooms: &Rooms, id: &str, user_id: &str) -> AppResult<Arc<Room>> {
    let room = lookup(rooms, id).await?;
    if !room.can_control(user_id) {
        return Err(AppErr::Forbidden);
    }
    Ok(room)
}

/// Pushes the post-mutation snapshot; the room lock is already released here.
async fn publish(hub: &Hub, room: &Room) {
    if let Some(frame) = room.to_json() {
        hub.broadcast(room.id(), frame).await;
    }
}

/* ---------------- lifecycle ---------------- */
async fn create(
    Extension(rooms): Extension<Rooms>,
    JsonBody(p): JsonBody<CreateRoomInput>,
) -> AppResult<Json<CreatedRoom>> {
    let room_id = Uuid::new_v4().to_string();
    let host_id = Uuid::new_v4().to_string();
    let room = rooms.create(room_id.clone(), p.name, host_id.clone()).await;
    Ok(Json(CreatedRoom { room_id, host_id, room_name: room.name().to_owned() }))
}

async fn show(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
) -> AppResult<Json<crate::room::Snapshot>> {
    Ok(Json(lookup(&rooms, &id).await?.snapshot()))
}

async fn remove(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
) -> AppResult<StatusCode> {
    if !rooms.delete(&id).await {
        return Err(not_found("Room"));
    }
    let live = hub.connections(&id).await;
    hub.broadcast_to(&id, Role::Listener, ROOM_CLOSED).await;
    hub.close(&id).await;
    tracing::info!(room = %id, connections = live, "room torn down");
    Ok(StatusCode::NO_CONTENT)
}

/* ---------------- membership ---------------- */
async fn join(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    JsonBody(p): JsonBody<JoinInput>,
) -> AppResult<Json<Joined>> {
    let room = lookup(&rooms, &id).await?;
    let user_id = Uuid::new_v4().to_string();
    room.join(&user_id, &p.user_name);
    publish(&hub, &room).await;
    Ok(Json(Joined { user_id }))
}

async fn leave(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    JsonBody(p): JsonBody<UserInput>,
) -> AppResult<StatusCode> {
    let room = lookup(&rooms, &id).await?;
    if room.leave(&p.user_id) {
        publish(&hub, &room).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RoleQuery { user_id: Option<String> }

async fn role(
    Path(id): Path<String>,
    Query(q): Query<RoleQuery>,
    Extension(rooms): Extension<Rooms>,
) -> AppResult<Json<RoleView>> {
    let room = lookup(&rooms, &id).await?;
    let uid = q.user_id.unwrap_or_default();
    Ok(Json(RoleView {
        is_host: !uid.is_empty() && room.is_host(&uid),
        can_control: room.can_control(&uid),
    }))
}

/* ---------------- playback ---------------- */
async fn play(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    Extension(catalog): Extension<Tracks>,
    JsonBody(p): JsonBody<PlayInput>,
) -> AppResult<StatusCode> {
    let room = controlled(&rooms, &id, &p.user_id).await?;
    let track = catalog.get(&p.track_id).ok_or_else(|| not_found("Track"))?;
    room.play_track(track);
    publish(&hub, &room).await;
    Ok(StatusCode::OK)
}

async fn pause(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    JsonBody(p): JsonBody<UserInput>,
) -> AppResult<StatusCode> {
    let room = controlled(&rooms, &id, &p.user_id).await?;
    room.pause();
    publish(&hub, &room).await;
    Ok(StatusCode::OK)
}

async fn resume(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    JsonBody(p): JsonBody<UserInput>,
) -> AppResult<StatusCode> {
    let room = controlled(&rooms, &id, &p.user_id).await?;
    room.resume();
    publish(&hub, &room).await;
    Ok(StatusCode::OK)
}

async fn seek(
    Path(id): Path<String>,
    Extension(rooms): Extension<Rooms>,
    Extension(hub): Extension<Hub>,
    JsonBody(p): JsonBody<SeekInput>,
) -> AppResult<StatusCode> {
    let room = controlled(&rooms, &id, &p.user_id).await?;
    room.seek(p.position);
    publish(&hub, &room).await;
    Ok(StatusCode::OK)
}
