use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kagami_metadata_engine::config::{CliConfig, EngineConfig, FileConfig};
use kagami_metadata_engine::{FileBlobStore, HttpMetadataApi, MetadataEngine};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// One-shot metadata sync: load the caches, pull both remote listings
/// once, flush, and report cache statistics.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the engine's persisted blobs.
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Directory with bundled seed snapshots, imported on first run.
    #[clap(long, value_parser = parse_path)]
    pub seed_dir: Option<PathBuf>,

    /// Base URL of the remote metadata API.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Path to a TOML config file. File values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Print cache statistics and exit without syncing.
    #[clap(long)]
    pub stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;

    let cli_config = CliConfig {
        data_dir: cli_args.data_dir,
        seed_dir: cli_args.seed_dir,
        base_url: cli_args.base_url,
    };
    let config = EngineConfig::resolve(&cli_config, file_config)?;

    info!(
        "metadata-sync {} ({}) using {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.api.base_url
    );

    let store = Arc::new(FileBlobStore::new(&config.data_dir)?);
    let api = Arc::new(HttpMetadataApi::new(
        config.api.base_url.clone(),
        config.api.page_size,
        config.api.timeout_secs,
    )?);
    let engine = MetadataEngine::new(&config, store, api);

    engine.initialize()?;

    if !cli_args.stats {
        match engine.sync_tags().await {
            Ok(outcome) => info!("Tag sync: {:?}", outcome),
            Err(err) => error!("Tag sync failed: {}", err),
        }
        match engine.sync_artists().await {
            Ok(outcome) => info!("Artist sync: {:?}", outcome),
            Err(err) => error!("Artist sync failed: {}", err),
        }
        engine.on_stop();
    }

    let artist_stats = engine.artists().stats();
    info!(
        "Caches: {} tags, {} artists, {} artist names, artist max id {}",
        engine.tags().len(),
        artist_stats.artist_count,
        artist_stats.name_count,
        artist_stats.max_id
    );

    Ok(())
}
