use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use arcade_server::agents::{Agent, ScoreboardEntry};
use arcade_server::config::ArenaConfig;
use arcade_server::coordinator::{Coordinator, FireReply, GuessReply, Registration, StepReply};
use arcade_server::error::ArenaError;
use arcade_server::server_protocol::{
    parse_fire, parse_guess, parse_list_query, parse_move, parse_register,
};
use arcade_server::session::SessionView;
use arcade_server::store::{FileStore, MemoryStore, RecordStore};
use arcade_server::types::GameKind;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type SharedState = Arc<Coordinator>;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
struct ApiError(ArenaError);

impl From<ArenaError> for ApiError {
    fn from(err: ArenaError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "request failed");
        }

        let mut body = json!({
            "error": err.to_string(),
            "retryable": err.is_retryable(),
        });
        if let Some(secs) = err.retry_after_secs() {
            body["retryAfter"] = json!(secs);
        }
        if let ArenaError::WallBlocked { position } = &err {
            body["blocked"] = json!(true);
            body["position"] = json!(position);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = err.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

fn status_for(err: &ArenaError) -> StatusCode {
    match err {
        ArenaError::Validation(_) | ArenaError::WallBlocked { .. } => StatusCode::BAD_REQUEST,
        ArenaError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ArenaError::Forbidden => StatusCode::FORBIDDEN,
        ArenaError::NotFound(_) => StatusCode::NOT_FOUND,
        ArenaError::Conflict(_) => StatusCode::CONFLICT,
        ArenaError::Capacity { .. } | ArenaError::RateLimited { .. } => {
            StatusCode::TOO_MANY_REQUESTS
        }
        ArenaError::Generation(_) | ArenaError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("arcade_server=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let config = ArenaConfig::from_env();
    let store: Arc<dyn RecordStore> = match std::env::var("ARENA_DB_PATH") {
        Ok(raw) if !raw.trim().is_empty() => {
            let path = PathBuf::from(raw.trim());
            let store = FileStore::open(path.clone())
                .await
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            info!(path = %store.path().display(), "using file store");
            Arc::new(store)
        }
        _ => {
            warn!("ARENA_DB_PATH not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    info!(
        cooldown_ms = config.move_cooldown_ms,
        maze_size = config.maze_size,
        seeded = config.seed.is_some(),
        "configuration loaded"
    );

    let app = create_app(Arc::new(Coordinator::new(store, config)));

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(port, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/agents", post(register_agent).get(list_agents))
        .route("/api/scoreboard", get(scoreboard))
        .route("/api/games", post(start_guessing).get(list_guessing))
        .route("/api/games/{id}/guess", post(guess))
        .route("/api/battleship", post(start_battleship).get(list_battleship))
        .route("/api/battleship/{id}/fire", post(fire))
        .route("/api/mousemaze", post(start_maze).get(list_maze))
        .route("/api/mousemaze/{id}/move", post(step))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn authenticate(state: &Coordinator, headers: &HeaderMap) -> ApiResult<Agent> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(state.authenticate(header).await?)
}

async fn register_agent(
    State(state): State<SharedState>,
    body: String,
) -> ApiResult<(StatusCode, Json<Registration>)> {
    let request = parse_register(&body)?;
    let registration = state.register_agent(&request.name).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn list_agents(State(state): State<SharedState>) -> ApiResult<Json<Vec<Agent>>> {
    Ok(Json(state.list_agents().await?))
}

async fn scoreboard(State(state): State<SharedState>) -> ApiResult<Json<Vec<ScoreboardEntry>>> {
    Ok(Json(state.scoreboard().await?))
}

async fn start_game(
    state: &Coordinator,
    headers: &HeaderMap,
    kind: GameKind,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    let agent = authenticate(state, headers).await?;
    let view = state.start_game(&agent, kind).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_games(
    state: &Coordinator,
    query: &HashMap<String, String>,
    kind: GameKind,
) -> ApiResult<Json<Vec<SessionView>>> {
    let filter = parse_list_query(query)?;
    Ok(Json(state.list_sessions(kind, &filter).await?))
}

async fn start_guessing(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    start_game(&state, &headers, GameKind::Guessing).await
}

async fn start_battleship(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    start_game(&state, &headers, GameKind::Battleship).await
}

async fn start_maze(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<SessionView>)> {
    start_game(&state, &headers, GameKind::Maze).await
}

async fn list_guessing(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<SessionView>>> {
    list_games(&state, &query, GameKind::Guessing).await
}

async fn list_battleship(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<SessionView>>> {
    list_games(&state, &query, GameKind::Battleship).await
}

async fn list_maze(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<SessionView>>> {
    list_games(&state, &query, GameKind::Maze).await
}

async fn guess(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<GuessReply>> {
    let agent = authenticate(&state, &headers).await?;
    let request = parse_guess(&body)?;
    Ok(Json(state.guess(&agent, &id, request.guess).await?))
}

async fn fire(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<FireReply>> {
    let agent = authenticate(&state, &headers).await?;
    let request = parse_fire(&body)?;
    Ok(Json(state.fire(&agent, &id, request.row, request.col).await?))
}

async fn step(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<StepReply>> {
    let agent = authenticate(&state, &headers).await?;
    let request = parse_move(&body)?;
    Ok(Json(state.step(&agent, &id, &request.direction).await?))
}
