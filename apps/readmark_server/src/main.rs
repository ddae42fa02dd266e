use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use readmark_core::{is_forum_context, ReadStateStore, ReadmarkError, STATE_CAPACITY};
use readmark_sync::{FileStore, SyncStore};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

const PAGE_BASE_URL: &str = "http://www.scpwiki.com/scp-";

#[derive(Parser)]
#[command(name = "readmark", about = "Readmark read-state server")]
struct Cli {
    /// Data directory for the file-backed sync store
    #[arg(long, default_value = "data/readmark")]
    data_dir: PathBuf,

    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Number of tracked catalog slots
    #[arg(long, default_value_t = STATE_CAPACITY)]
    capacity: usize,
}

#[derive(Clone)]
struct AppState {
    reads: Arc<ReadStateStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let store: Arc<dyn SyncStore> = Arc::new(FileStore::open(&cli.data_dir)?);
    let reads = Arc::new(ReadStateStore::with_capacity(store, cli.capacity).await?);

    let app = Router::new()
        .route("/state", get(get_state))
        .route("/toggle", post(toggle_state))
        .route("/read", get(read_indices))
        .route("/readlist", get(read_list))
        .route("/export", get(export_state))
        .layer(CorsLayer::permissive())
        .with_state(AppState { reads });

    tracing::info!(addr = %cli.addr, "serving read state");
    let listener = TcpListener::bind(&cli.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct IdentQuery {
    ident: String,
}

#[derive(Deserialize)]
struct ToggleRequest {
    ident: String,
}

#[derive(Serialize)]
struct StateResponse {
    ident: String,
    read: bool,
}

fn status_for(err: ReadmarkError) -> StatusCode {
    match err {
        ReadmarkError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn get_state(
    State(state): State<AppState>,
    Query(q): Query<IdentQuery>,
) -> Result<Json<StateResponse>, StatusCode> {
    if is_forum_context(&q.ident) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let read = state.reads.get_state(&q.ident).map_err(status_for)?;
    Ok(Json(StateResponse {
        ident: q.ident,
        read,
    }))
}

async fn toggle_state(
    State(state): State<AppState>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<StateResponse>, StatusCode> {
    if is_forum_context(&body.ident) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let read = state.reads.toggle_state(&body.ident).await.map_err(status_for)?;
    Ok(Json(StateResponse {
        ident: body.ident,
        read,
    }))
}

async fn read_indices(State(state): State<AppState>) -> Json<serde_json::Value> {
    let indices = state.reads.all_indices(true);
    Json(serde_json::json!({
        "count": indices.len(),
        "indices": indices,
    }))
}

/// Page URL -> title map for every read item, the shape the download
/// collaborator saves to a file.
async fn read_list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut list = serde_json::Map::new();
    for index in state.reads.all_indices(true) {
        list.insert(
            format!("{PAGE_BASE_URL}{index}"),
            serde_json::Value::String(format!("SCP-{index}")),
        );
    }
    Json(serde_json::Value::Object(list))
}

async fn export_state(State(state): State<AppState>) -> String {
    state.reads.export()
}
