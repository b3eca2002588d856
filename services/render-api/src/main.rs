//! Static map render server.
//!
//! HTTP server rendering map styles to PNG images.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use map_render::FetchConfig;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use render_api::state::{AppState, ServerOptions};

#[derive(Parser, Debug)]
#[command(name = "render-api")]
#[command(about = "Start a server to render map styles to images")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "RENDER_LISTEN", default_value = "0.0.0.0:8000")]
    listen: String,

    /// Directory containing local mbtiles files to render
    #[arg(short, long, env = "RENDER_TILES")]
    tiles: Option<PathBuf>,

    /// Directory containing GPX/geojson files to render in overlay
    #[arg(short, long, env = "RENDER_OVERLAY")]
    overlay: Option<PathBuf>,

    /// Hosted map API access token used when a request has none
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN")]
    token: Option<String>,

    /// Maximum renders running at once (default: number of CPU cores)
    #[arg(long, env = "RENDER_MAX_CONCURRENT")]
    max_concurrent_renders: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let defaults = ServerOptions::default();
    let options = ServerOptions {
        tile_path: args.tiles,
        overlay_path: args.overlay,
        token: args.token,
        max_concurrent_renders: args
            .max_concurrent_renders
            .unwrap_or(defaults.max_concurrent_renders),
        fetch: FetchConfig::from_env(),
    };
    info!(max_concurrent_renders = options.max_concurrent_renders, "Starting render server");

    let state = Arc::new(AppState::new(options, Some(prometheus_handle))?);
    let app = render_api::app(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
