mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::*;
use crate::state::{create_default_config, load_config, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "console.toml")]
    config: PathBuf,
    #[arg(long, default_value = "0.0.0.0:3001")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !args.config.exists() {
        warn!(path = %args.config.display(), "config file missing, creating default config");
        create_default_config(&args.config)?;
    }

    let config = load_config(&args.config)?;
    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(state);

    info!("console-server listening on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let upstream_routes = Router::new()
        .route("/*path", get(upstream).post(upstream).delete(upstream))
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    let auth_routes = Router::new()
        .route("/login", post(login))
        .route("/authenticate", get(authenticate))
        .route("/session", get(session))
        .route("/logout", post(logout));
    #[cfg(feature = "auth-bypass")]
    let auth_routes = auth_routes.route("/admin-bypass", post(admin_bypass));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/credentials",
            post(save_credentials).delete(clear_credentials),
        )
        .route("/api/credentials/status", get(credentials_status))
        .nest("/auth", auth_routes)
        .nest("/api/upstream", upstream_routes)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
