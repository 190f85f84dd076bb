use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{delete, get, post},
};
use chat_hub::ChatHub;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod db;
mod handlers;
mod metrics;
mod models;
mod repository;
mod ws;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod test_helpers;

use crate::config::{CliOverrides, FileConfig, ParleyConfig};
use crate::db::Database;
use crate::metrics::ServerMetrics;
use crate::repository::ChatRepository;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Real-time multi-user chat server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to ~/.parley)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat server in the foreground
    Serve(ServeArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Parser)]
struct ServeArgs {
    /// Port for the web server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub hub: Arc<ChatHub>,
    pub repository: Arc<ChatRepository>,
    pub db: Arc<Database>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let layout = ParleyConfig::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Serve(args) => run_server(args, layout).await,
        Commands::Config => {
            let config = FileConfig::resolve(&layout.data_dir, &CliOverrides::default())?;
            println!("# {}", layout.config_toml_path().display());
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Every route the server exposes, without middleware.
pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/{client_id}", get(handlers::chat_websocket_handler))
        .route("/api/signup", post(handlers::signup_handler))
        .route("/api/login", post(handlers::login_handler))
        .route("/api/users", get(handlers::list_users))
        .route(
            "/api/users/{username}/avatar",
            post(handlers::update_avatar),
        )
        .route("/api/history", get(handlers::get_history))
        .route(
            "/api/groups",
            get(handlers::list_groups).post(handlers::create_group),
        )
        .route("/api/groups/{name}", get(handlers::get_group))
        .route("/api/groups/{name}/members", post(handlers::add_member))
        .route(
            "/api/groups/{name}/members/{member}",
            delete(handlers::remove_member),
        )
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}

async fn run_server(args: ServeArgs, layout: ParleyConfig) -> Result<()> {
    let default_directive = if args.debug {
        "parley=debug,chat_hub=debug,tower_http=debug,info"
    } else {
        "parley=info,chat_hub=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Parley chat server");

    let overrides = CliOverrides {
        host: args.host,
        port: args.port,
    };
    let config = Arc::new(FileConfig::resolve(&layout.data_dir, &overrides)?);
    info!(
        "Chat config: broadcast_recipient={:?}, reconnect_policy={:?}, queue={}",
        config.chat.broadcast_recipient,
        config.chat.reconnect_policy,
        config.chat.outbound_queue_capacity
    );

    info!("Initializing database...");
    let db = Arc::new(Database::new(&layout.db_url(&config.storage)).await?);
    let repository = Arc::new(ChatRepository::new(db.pool.clone()));

    let hub = Arc::new(
        ChatHub::new(config.chat.clone(), repository.clone()).context("Invalid chat configuration")?,
    );

    let app_state = AppState {
        hub: hub.clone(),
        repository,
        db,
        metrics: Arc::new(ServerMetrics::new()),
    };

    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port)
        .parse::<SocketAddr>()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Parley listening on http://{}", actual_addr);
    info!("  GET    /ws/{{client_id}}     - Chat WebSocket");
    info!("  POST   /api/signup          - Create account");
    info!("  POST   /api/login           - Log in");
    info!("  GET    /api/history         - Message history");
    info!("  GET    /api/groups          - List groups");

    let hub_for_shutdown = hub.clone();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, closing chat sessions...");
        // WebSocket tasks outlive the HTTP connection tracking, close them first.
        hub_for_shutdown.shutdown().await;
    };

    let server_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error");

    info!("Shutdown complete");
    server_result
}
