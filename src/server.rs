//! HTTP surface: the Lingr webhook plus the static web client.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bot::Bot;
use crate::config::Config;
use crate::docomo;
use crate::lingr::Status;

pub const WEBHOOK_PATH: &str = "/lingr";

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to create docomo client: {0}")]
    Client(#[from] docomo::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

struct AppState {
    bot: Bot,
    static_dir: PathBuf,
}

/// Build the router. `static_dir` holds `index.html` and the `assets/` directory.
pub fn router(bot: Bot, static_dir: PathBuf) -> Router {
    let assets = ServeDir::new(static_dir.join("assets"));
    let state = Arc::new(AppState { bot, static_dir });

    Router::new()
        .route("/", get(index).fallback(bad_request))
        .route(WEBHOOK_PATH, post(webhook).fallback(bad_request))
        .nest_service("/assets", assets)
        .fallback(bad_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Load config-derived pieces, bind `config.addr` and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<(), ServeError> {
    let client = docomo::Client::new(
        config.apikey,
        config.user,
        config.endpoints,
        config.insecure_tls,
    )?;
    let bot = Bot::new(client, config.read_images, config.max_image_bytes);
    info!(
        "Bot nickname: {}, image reading {}",
        bot.nickname(),
        if config.read_images { "enabled" } else { "disabled" }
    );

    let listener = TcpListener::bind(&config.addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.addr.clone(),
            source,
        })?;
    info!("Listening on {}", config.addr);

    axum::serve(listener, router(bot, config.static_dir))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn bad_request() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "Bad Request")
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read(&path).await {
        Ok(html) => ([(CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let status = match Status::decode(&body) {
        Ok(status) => status,
        Err(e) => {
            warn!("Bad webhook payload: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match state.bot.handle_status(&status).await {
        Ok(replies) => (
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            replies.join("\n"),
        )
            .into_response(),
        Err(e) => {
            warn!("Webhook failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
