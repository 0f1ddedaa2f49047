//! MANDI market daemon.
//!
//! Hosts the quotation negotiation core over HTTP: buyers post orders,
//! sellers quote against them, the buyer accepts exactly one quotation
//! and sibling quotes close atomically. State is held in memory and
//! snapshotted to a JSON file after every mutation.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};

use mandi_server::api::{self, AppState};
use mandi_server::market::Market;
use mandi_server::persist;

#[derive(Parser)]
#[command(name = "mandi-server", about = "MANDI quotation market daemon")]
struct Cli {
    /// HTTP port to listen on.
    #[arg(long, default_value_t = 3014)]
    port: u16,

    /// Snapshot file path (default: platform data dir).
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Keep state in memory only; never touch disk.
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let data_file = if cli.ephemeral {
        None
    } else {
        Some(cli.data_file.unwrap_or_else(persist::default_path))
    };

    let market = match &data_file {
        Some(path) => match persist::load(path) {
            Ok(Some(snapshot)) => {
                tracing::info!(path = %path.display(), orders = snapshot.orders.len(), "snapshot loaded");
                Market::restore(snapshot).await
            }
            Ok(None) => Market::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load snapshot");
                std::process::exit(1);
            }
        },
        None => Market::new(),
    };

    let state = Arc::new(AppState { market, data_file });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let addr = format!("0.0.0.0:{}", cli.port);
    tracing::info!(%addr, "mandi-server listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server failed");
}
