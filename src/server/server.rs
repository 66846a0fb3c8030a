use anyhow::Result;
use std::time::Instant;

use serde::Serialize;
use tower_http::services::ServeDir;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};

use super::collection_routes::collection_routes;
use super::state::*;
use super::track_routes::track_routes;
use super::upload_routes::upload_routes;
use super::{log_requests, ServerConfig};
use crate::pipeline::{MediaLayout, SchedulerHandle};

#[derive(Serialize)]
struct ServerStats {
    pub status: &'static str,
    pub version: &'static str,
    pub hash: String,
    pub uptime_sec: u64,
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        hash: state.hash.clone(),
        uptime_sec: state.start_time.elapsed().as_secs(),
    };
    Json(stats)
}

impl ServerState {
    fn new(
        config: ServerConfig,
        store: GuardedLibraryStore,
        layout: MediaLayout,
        tools: GuardedMediaTools,
        grouping: GuardedGroupingManager,
        scheduler: SchedulerHandle,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            layout,
            tools,
            grouping,
            scheduler,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    store: GuardedLibraryStore,
    layout: MediaLayout,
    tools: GuardedMediaTools,
    grouping: GuardedGroupingManager,
    scheduler: SchedulerHandle,
) -> Result<Router> {
    let state = ServerState::new(
        config.clone(),
        store,
        layout,
        tools,
        grouping,
        scheduler,
    );

    let api_routes: Router = Router::new()
        .merge(upload_routes(config.max_audio_bytes))
        .merge(track_routes())
        .merge(collection_routes())
        .with_state(state.clone());

    let health_routes: Router = Router::new()
        .route("/health", get(health))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new(),
    };

    let app: Router = home_router
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    store: GuardedLibraryStore,
    layout: MediaLayout,
    tools: GuardedMediaTools,
    grouping: GuardedGroupingManager,
    scheduler: SchedulerHandle,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, store, layout, tools, grouping, scheduler)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
