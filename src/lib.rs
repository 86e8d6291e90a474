pub mod actor;
pub mod appresult;
pub mod config;
pub mod events;
pub mod gateway;
pub mod hub;
pub mod info;
pub mod presence;
pub mod rooms;
pub mod ws;

use std::{sync::Arc, time::Instant};

use axum::{extract::FromRef, routing::get, Router};
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use actor::HubHandle;
pub use appresult::{AppError, AppResult};
pub use config::{ChatConfig, Config};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: HubHandle,
    pub config: Arc<Config>,
    pub started: Instant,
}

impl AppState {
    pub fn new(hub: HubHandle, config: Config) -> Self {
        Self {
            hub,
            config: Arc::new(config),
            started: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/health", get(info::health))
        .route("/info", get(info::info))
        .fallback_service(assets)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
