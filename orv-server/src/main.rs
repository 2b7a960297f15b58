//! OpenRaceView Server
//!
//! Main server application with web UI and REST API

use anyhow::Result;
use clap::Parser;
use orv_core::RaceDataSource;
use orv_openf1::client::DEFAULT_API_BASE;
use orv_openf1::{DemoSource, OpenF1Client};
use orv_server::{api, playback, state};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "orv-server")]
#[command(about = "OpenRaceView telemetry server with web UI")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 9300)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Base URL of the OpenF1 API
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Serve the built-in demo session instead of the OpenF1 API
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting OpenRaceView Server");

    // Create application state
    let source: Arc<dyn RaceDataSource> = if args.demo {
        info!("Using built-in demo data source");
        Arc::new(DemoSource::new())
    } else {
        info!("Using OpenF1 API at {}", args.api_base);
        Arc::new(OpenF1Client::new(args.api_base))
    };
    let state = state::AppState::new(source);

    // Build the router
    let app = api::create_router(state.clone());

    // Start playback ticker in background
    tokio::spawn(playback::run_ticker(state.clone()));

    // Start server
    let addr = SocketAddr::from((args.bind, args.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
