use axum::{
    body::Body,
    extract::{Extension, Path, Request},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    catalog::Track,
    error::{not_found, AppErr, AppResult},
    state::Tracks,
};

pub fn router() -> Router {
    Router::new()
        .route("/music/catalog",    get(catalog))
        .route("/music/rescan",     post(rescan))
        .route("/music/stream/:id", get(stream))
}

async fn catalog(Extension(cat): Extension<Tracks>) -> Json<Vec<Track>> {
    Json(cat.tracks())
}

async fn rescan(Extension(cat): Extension<Tracks>) -> AppResult<Json<serde_json::Value>> {
    let n = tokio::task::spawn_blocking(move || {
        cat.rescan();
        cat.tracks().len()
    })
    .await
    .map_err(|e| AppErr::Io(std::io::Error::other(e)))?;
    Ok(Json(json!({ "tracks": n })))
}

/// Serves the file behind a track id; `Range` requests get partial content.
async fn stream(
    Path(id): Path<String>,
    Extension(cat): Extension<Tracks>,
    req: Request,
) -> AppResult<Response> {
    let track = cat.get(&id).ok_or_else(|| not_found("Track"))?;
    match ServeFile::new(&track.path).oneshot(req).await {
        Ok(res) => Ok(res.map(Body::new)),
        Err(never) => match never {},
    }
}
