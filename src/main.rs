mod config;
mod error;
mod extract;
mod gateway;
mod handlers;
mod relay;
#[cfg(test)]
mod testing;
mod types;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use tower_http::cors::CorsLayer;

use config::Config;
use error::AppError;
use handlers::AppState;

/// Token part of an `Authorization: <scheme> <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let expected = state.config.self_api_key.as_deref();

    match (bearer_token(req.headers()), expected) {
        (Some(token), Some(expected)) if token == expected => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized),
    }
}

fn router(state: Arc<AppState>) -> Router {
    let management = Router::new()
        .route("/create-instance", post(handlers::create_instance))
        .route("/send-message", post(handlers::send_message))
        .route("/instance-control", post(handlers::instance_control))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(management)
        .route(handlers::WEBHOOK_PATH, post(handlers::evolution_webhook))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let config = Config::from_env()?;
    info!("Evolution API: {}", config.gateway_url);
    if config.self_api_key.is_none() {
        warn!("SELF_API_KEY is not set; every management request will be rejected");
    }
    if config.sink_url.is_none() {
        warn!("SUPABASE_WEBHOOK_URL is not set; webhook events will be dropped");
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("evolution-bridge/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, http));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("Bridge server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
