mod catalog;
mod config;
mod error;
mod hub;
mod room;
mod routes;
mod state;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    catalog::Catalog,
    config::Config,
    room::RoomRegistry,
    state::{Hub, Rooms, Tracks},
};

const BODY_LIMIT: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synctunes=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;
    info!("music directory: {}", cfg.music_dir.display());
    tokio::fs::create_dir_all(&cfg.music_dir).await?;

    let catalog: Tracks = Arc::new(Catalog::scan(cfg.music_dir.clone()));
    let rooms: Rooms = Arc::new(RoomRegistry::default());
    let hub = Hub::default();

    let app = Router::new()
        .merge(routes::router())
        .nest_service("/static", ServeDir::new(&cfg.static_dir))
        .layer(Extension(catalog))
        .layer(Extension(rooms))
        .layer(Extension(hub))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    let listener = tokio::net::TcpListener::bind(cfg.addr()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
