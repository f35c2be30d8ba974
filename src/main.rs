use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use clap::{Parser, Subcommand};
use sessiongate::config::AppConfig;
use sessiongate::gate::{RouteGate, route_gate};
use sessiongate::{ResilientClient, SessionStore};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Parser, Debug)]
#[command(name = "sessiongate", about = "Route gate edge server and session probe")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the site behind the route gate (default).
    Serve,
    /// Probe the API for the signed-in identity and print the session.
    Whoami,
    /// End the server session and print the cleared session.
    Logout,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().expect("invalid configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Whoami => {
            let store = SessionStore::connect(api_client(&config)).await;
            print_session(&store);
        }
        Command::Logout => {
            let store = SessionStore::new(api_client(&config));
            store.logout().await;
            print_session(&store);
        }
    }
}

async fn serve(config: AppConfig) {
    let gate = Arc::new(RouteGate::new(config.gate.clone()));

    let site = ServeDir::new(&config.site_dir).append_index_html_on_directories(true);
    let app = Router::new()
        .fallback_service(site)
        .layer(axum::middleware::from_fn_with_state(gate, route_gate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(
        port = config.port,
        site_dir = %config.site_dir.display(),
        cookie = %config.gate.cookie_name,
        "sessiongate edge listening"
    );
    axum::serve(listener, app).await.expect("server failed");
}

fn api_client(config: &AppConfig) -> Arc<ResilientClient> {
    let client = Arc::new(ResilientClient::from_config(config.client.clone()).expect("http client init failed"));

    let mut invalidations = client.subscribe_invalidations();
    tokio::spawn(async move {
        while let Ok(event) = invalidations.recv().await {
            tracing::warn!(login = %event.login_path, reason = %event.reason, "session invalidated; sign in again");
        }
    });
    client
}

fn print_session(store: &SessionStore) {
    match serde_json::to_string_pretty(&store.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "session encode failed"),
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
