mod handlers;
mod response;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;
const REQUEST_TIMEOUT_SEC: u64 = 3600;

#[tokio::main]
async fn main() {
    if std::env::var("LOG_DIR").is_ok() {
        let dir = std::env::var("LOG_DIR").unwrap();
        if let Err(err) = base::init_file_logger(&dir) {
            eprintln!("failed to init file logger at {dir}: {err}, falling back to stdout");
            base::init_stdout_logger();
        }
    } else {
        base::init_stdout_logger();
    }

    let settings = config::Settings::from_env();
    let host = settings.host.clone();
    let port = settings.port;
    log::info!("starting transcription service on {host}:{port}");

    let state = AppState::new(settings);

    let warm_key = model::ModelKey::new(
        state.settings.default_model.clone(),
        state.settings.default_device.clone(),
        state.settings.default_compute_type.clone(),
    );
    if let Err(err) = state.model.warm(warm_key).await {
        log::warn!("failed to pre-warm default model, continuing to serve: {err}");
    }

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models))
        .route("/config", get(handlers::get_config))
        .route("/model-cache/status", get(handlers::model_cache_status))
        .route("/model-cache/clear", post(handlers::model_cache_clear))
        .route("/api/fasterwhisper/transcribe", post(handlers::transcribe))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SEC)))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .unwrap_or_else(|err| panic!("failed to bind {host}:{port}: {err}"));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| log::error!("server exited with error: {err}"));

    log::info!("clearing model cache before exit");
    state.model.clear_cache().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
