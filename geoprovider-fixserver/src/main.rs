mod route;
mod state;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, info};
use serde::Deserialize;
use tokio::net::TcpListener;

use anyhow::Context;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    result::Result as StdResult,
};

use state::{FixMode, ServerState};

type Result<T = (), E = anyhow::Error> = StdResult<T, E>;

#[derive(Debug, Deserialize)]
struct PositionQuery {
    #[serde(default)]
    high_accuracy: bool,
}

async fn position(
    State(state): State<ServerState>,
    Query(query): Query<PositionQuery>,
) -> Response {
    debug!("Position requested (high accuracy: {})", query.high_accuracy);
    match state.next_fix(query.high_accuracy).await {
        Ok(fix) => Json(fix).into_response(),
        Err(why) => why.into_response(),
    }
}

async fn set_mode(
    State(state): State<ServerState>,
    Path(mode): Path<String>,
) -> StdResult<StatusCode, StatusCode> {
    let mode = mode.parse::<FixMode>()?;
    state.set_mode(mode);
    Ok(StatusCode::OK)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/position", get(position))
        .route(
            "/mode",
            get(|State(state): State<ServerState>| async move { state.mode().to_string() }),
        )
        .route("/mode/{mode}", post(set_mode))
        .with_state(state)
}

const CLI_MSG: &str = "Usage: geoprovider-fixserver [BIND_ADDR] [SEED]";

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let socket_addr = args
        .get(1)
        .map(|raw_binding| raw_binding.parse::<SocketAddr>())
        .transpose()
        .context("Invalid socket addr passed")
        .context(CLI_MSG)?
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3537));

    let seed = args
        .get(2)
        .map(|raw_seed| raw_seed.parse::<u64>())
        .transpose()
        .context("Invalid seed passed")
        .context(CLI_MSG)?
        .unwrap_or_else(|| rand::random_range(0..=u64::MAX));

    let route = route::default_route(seed)?;
    let state = ServerState::new(route);

    let listener = TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("Failed to bind to {socket_addr}"))?;

    info!(
        "Starting geoprovider fix server {} on {socket_addr} (seed {seed})",
        env!("CARGO_PKG_VERSION")
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("Error while running server")
}
