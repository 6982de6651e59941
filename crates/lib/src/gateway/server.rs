//! HTTP server: status, config and workspace pass-through routes.

use crate::bridge::Bridge;
use crate::config::{self, Config, SlackConfig};
use crate::outgoing::DeliveryError;
use crate::slack::SlackClient;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state for the routes.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<RwLock<Config>>,
    /// Where `POST /config` saves to.
    pub config_path: PathBuf,
    pub bridge: Arc<Bridge>,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn upstream_error(e: DeliveryError) -> (StatusCode, Json<Value>) {
    let status = match e {
        DeliveryError::NotConnected | DeliveryError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

/// Routes over `state`. Exposed so callers can mount them on their own listener.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/status", get(status))
        .route("/config", get(get_config).post(post_config))
        .route("/user", get(user))
        .route("/users", get(users))
        .route("/channels", get(channels))
        .route("/team", get(team))
        .route("/data", get(data))
        .with_state(state)
}

/// Start the Slack connection and serve the routes until SIGINT/SIGTERM.
pub async fn run_server(config: Config, config_path: PathBuf) -> Result<()> {
    let bind = config.server.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        log::warn!(
            "binding to non-loopback address {}; /config exposes Slack credentials",
            bind
        );
    }

    let bridge = Arc::new(Bridge::new().await);
    let client = Arc::new(SlackClient::new(config::resolve_slack_config(&config)));
    bridge.set_connection(client).await;
    {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            let Ok(connection) = bridge.connection().await else {
                return;
            };
            match connection.connect().await {
                Ok(()) => log::info!("slack connection established"),
                Err(e) => log::warn!("slack connect failed: {}", e),
            }
        });
    }

    let bind_addr = format!("{}:{}", bind, config.server.port);
    let state = ServerState {
        config: Arc::new(RwLock::new(config)),
        config_path,
        bridge,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    log::info!("server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<ServerState>) -> Json<Value> {
    let port = state.config.read().await.server.port;
    Json(json!({
        "runtime": "running",
        "port": port,
    }))
}

/// GET /status: connection state and outstanding deliveries.
async fn status(State(state): State<ServerState>) -> Json<Value> {
    let connected = state.bridge.is_connected().await;
    let stages = state.bridge.pipeline().names().await;
    Json(json!({
        "connected": connected,
        "pending": state.bridge.pending().len(),
        "stages": stages,
    }))
}

async fn get_config(State(state): State<ServerState>) -> Json<SlackConfig> {
    let slack = state.config.read().await.slack.clone();
    Json(slack)
}

/// POST /config: save the Slack section, then reconfigure and reconnect in the background.
async fn post_config(
    State(state): State<ServerState>,
    Json(slack): Json<SlackConfig>,
) -> Result<Json<SlackConfig>, (StatusCode, Json<Value>)> {
    let effective = {
        let mut g = state.config.write().await;
        g.slack = slack;
        config::save_config(&state.config_path, &g).map_err(|e| {
            log::error!("saving config failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
        })?;
        config::resolve_slack_config(&g)
    };

    let bridge = state.bridge.clone();
    tokio::spawn(async move {
        match bridge.reconfigure(effective).await {
            Ok(()) => log::info!("slack reconnected with new config"),
            Err(e) => log::warn!("slack reconnect after config change failed: {}", e),
        }
    });

    let saved = state.config.read().await.slack.clone();
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    id: Option<String>,
}

async fn user(State(state): State<ServerState>, Query(q): Query<UserQuery>) -> ApiResult {
    let Some(id) = q.id.filter(|s| !s.trim().is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing query parameter: id" })),
        ));
    };
    state.bridge.get_user_profile(&id).await.map(Json).map_err(upstream_error)
}

async fn users(State(state): State<ServerState>) -> ApiResult {
    state.bridge.get_users().await.map(Json).map_err(upstream_error)
}

async fn channels(State(state): State<ServerState>) -> ApiResult {
    state.bridge.get_channels().await.map(Json).map_err(upstream_error)
}

async fn team(State(state): State<ServerState>) -> ApiResult {
    state.bridge.get_team().await.map(Json).map_err(upstream_error)
}

async fn data(State(state): State<ServerState>) -> ApiResult {
    state.bridge.get_data().await.map(Json).map_err(upstream_error)
}
