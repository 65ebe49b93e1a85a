//! pyramid-tiles - A tile server for raster pyramids.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyramid_tiles::{
    config::{Cli, Command, EtagConfig, LevelsConfig, ServeConfig},
    server::{create_router, RouterConfig},
    tile::{decode_fingerprint, encode_fingerprint, SourceConfig, TileService},
    FetchEngine, Fingerprint, HttpDelegate, Raster, RasterConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Levels(config) => run_levels(config),
        Command::Etag(config) => run_etag(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut raster_config = match read_raster_config(&config.raster) {
        Ok(raster_config) => raster_config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(seed) = &config.etag_seed {
        raster_config.etag_seed = Some(Fingerprint::decode(seed).value);
    }

    let raster = match raster_config.build() {
        Ok(raster) => raster,
        Err(e) => {
            error!("Invalid raster {}: {}", config.raster.display(), e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Raster: {}", config.raster.display());
    info!("  Source: {}{}", config.source, config.suffix);
    if let Some(ref base_url) = config.base_url {
        info!("  Base URL: {}", base_url);
    }
    info!(
        "  Gzip: {}",
        if config.no_decompress {
            "passed through"
        } else {
            "inflated"
        }
    );
    log_levels(&raster);

    let delegate = match HttpDelegate::new(config.parsed_base_url()) {
        Ok(delegate) => delegate,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = FetchEngine::new(delegate).with_etag_decoding(config.etag_decoding());

    let source = SourceConfig::new(config.source.clone())
        .with_suffix(config.suffix.clone())
        .with_decompress(!config.no_decompress)
        .with_max_retries(config.max_retries);

    let mut tile_service = TileService::new(raster, engine, source);
    match &config.empty_tile {
        Some(file) => match file.read(tile_service.raster().max_tile_size()) {
            Ok(data) => {
                info!("  Empty tile: {} ({} bytes)", file, data.len());
                tile_service = tile_service.with_empty_tile(data.into());
            }
            Err(e) => {
                error!("Failed to read empty tile {}: {}", file, e);
                return ExitCode::FAILURE;
            }
        },
        None => warn!("  Empty tile: none, missing tiles answer 404"),
    }

    let router = create_router(tile_service, build_router_config(&config));

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/tile/0/0/0", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Read and parse a raster directive file.
fn read_raster_config(path: &Path) -> Result<RasterConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read raster file {}: {}", path.display(), e))?;
    RasterConfig::from_directives(&text)
        .map_err(|e| format!("Invalid raster file {}: {}", path.display(), e))
}

fn log_levels(raster: &Raster) {
    let pyramid = raster.pyramid();
    info!(
        "  Levels: {} ({} skipped), {} slice(s), {} tiles",
        pyramid.level_count(),
        pyramid.skip(),
        pyramid.slices(),
        pyramid.total_tiles()
    );
    for (index, level) in pyramid.levels().iter().enumerate() {
        info!(
            "    {:>2}: {}x{} tiles, resolution {}",
            index, level.width, level.height, level.resolution_x
        );
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyramid_tiles=debug,tower_http=debug"
    } else {
        "pyramid_tiles=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Levels Command
// =============================================================================

fn run_levels(config: LevelsConfig) -> ExitCode {
    let raster = match read_raster_config(&config.raster)
        .and_then(|raster_config| raster_config.build().map_err(|e| e.to_string()))
    {
        Ok(raster) => raster,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let pyramid = raster.pyramid();

    if config.json {
        let levels: Vec<_> = pyramid
            .levels()
            .iter()
            .enumerate()
            .map(|(index, level)| {
                serde_json::json!({
                    "level": index,
                    "width": level.width,
                    "height": level.height,
                    "resolution_x": level.resolution_x,
                    "resolution_y": level.resolution_y,
                    "tile_offset": level.tile_offset,
                })
            })
            .collect();
        let json = serde_json::json!({
            "skip": pyramid.skip(),
            "slices": pyramid.slices(),
            "total_tiles": pyramid.total_tiles(),
            "levels": levels,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("level  tiles          resolution        offset");
    println!("─────  ─────────────  ────────────────  ──────────");
    for (index, level) in pyramid.levels().iter().enumerate() {
        let marker = if index < pyramid.skip() { "*" } else { " " };
        println!(
            "{:>4}{} {:>6}x{:<6}  {:<16.10}  {}",
            index, marker, level.width, level.height, level.resolution_x, level.tile_offset
        );
    }
    println!();
    println!(
        "{} level(s), {} slice(s), {} tiles",
        pyramid.level_count(),
        pyramid.slices(),
        pyramid.total_tiles()
    );
    if pyramid.skip() > 0 {
        println!("* hidden from clients");
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Etag Command
// =============================================================================

fn run_etag(config: EtagConfig) -> ExitCode {
    if config.decode {
        let (value, missing) = decode_fingerprint(&config.input);
        println!("value:   {}", value);
        println!("missing: {}", missing);
        return ExitCode::SUCCESS;
    }

    match config.input.parse::<u64>() {
        Ok(value) => {
            println!("{}", encode_fingerprint(value, config.missing));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: '{}' is not a 64-bit value: {}", config.input, e);
            ExitCode::FAILURE
        }
    }
}
