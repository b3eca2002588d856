//! Command-line map exporter.
//!
//! Renders a style file (or a hosted `mapbox://styles/...` style) to a PNG file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use map_common::ResourceResponse;
use map_render::mapbox::{is_mapbox_style_url, normalize_style_url};
use map_render::{FetchConfig, RemoteFetcher, RenderOptions};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "render-cli")]
#[command(about = "Export a map style to an image")]
#[command(version)]
struct Args {
    /// Style JSON file, or a `mapbox://styles/<user>/<style>` URL
    style: String,

    /// Output PNG file
    img_filename: PathBuf,

    width: u32,

    height: u32,

    /// Center of map as longitude,latitude (no spaces)
    #[arg(short, long, value_parser = parse_list, allow_hyphen_values = true)]
    center: Option<NumberList>,

    /// Zoom level
    #[arg(short, long)]
    zoom: Option<f64>,

    /// Bounds of map as west,south,east,north (no spaces)
    #[arg(short, long, value_parser = parse_list, allow_hyphen_values = true)]
    bounds: Option<NumberList>,

    /// Pixel ratio
    #[arg(long)]
    ratio: Option<f64>,

    /// Pixels kept clear around the bounds
    #[arg(long)]
    padding: Option<f64>,

    /// Map bearing in degrees (0-360)
    #[arg(long)]
    bearing: Option<f64>,

    /// Map pitch in degrees (0-60)
    #[arg(long)]
    pitch: Option<f64>,

    /// Directory containing local mbtiles files
    #[arg(short, long, env = "RENDER_TILES")]
    tiles: Option<PathBuf>,

    /// Hosted map API access token
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN")]
    token: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Comma separated numbers given as one argument.
#[derive(Debug, Clone, PartialEq)]
struct NumberList(Vec<f64>);

/// `"a,b,c"` to numbers; anything unparsable is an error.
fn parse_list(text: &str) -> Result<NumberList, String> {
    text.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("not a number: {v:?}"))
        })
        .collect::<Result<_, _>>()
        .map(NumberList)
}

impl Args {
    fn options(&self) -> RenderOptions {
        RenderOptions {
            zoom: self.zoom,
            center: self.center.clone().map(|c| c.0),
            bounds: self.bounds.clone().map(|b| b.0),
            bearing: self.bearing,
            pitch: self.pitch,
            ratio: self.ratio,
            padding: self.padding,
            tile_path: self.tiles.clone(),
            token: self.token.clone().filter(|t| !t.is_empty()),
            images: Default::default(),
        }
    }
}

async fn load_style(style: &str, token: Option<&str>) -> Result<Value> {
    if is_mapbox_style_url(style) {
        let url = normalize_style_url(style, token)?;
        let fetcher = RemoteFetcher::new(FetchConfig::from_env())?;
        let ResourceResponse::Data(body) = fetcher.fetch(&url).await? else {
            bail!("Style not found: {style}");
        };
        return serde_json::from_slice(&body).context("Error parsing JSON style");
    }

    let path = Path::new(style);
    if !path.exists() {
        bail!("Style JSON file does not exist: {style}");
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read style file {style}"))?;
    serde_json::from_str(&text).context("Error parsing JSON style")
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

    let options = args.options();
    let style = load_style(&args.style, options.token.as_deref()).await?;

    info!(
        style = %args.style,
        width = args.width,
        height = args.height,
        output = %args.img_filename.display(),
        "Exporting map"
    );

    let png = map_render::render(style, args.width, args.height, &options).await?;
    std::fs::write(&args.img_filename, &png)
        .with_context(|| format!("failed to write {}", args.img_filename.display()))?;

    info!(bytes = png.len(), output = %args.img_filename.display(), "Map exported");
    Ok(())
}
