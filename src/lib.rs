//! # pyramid-tiles
//!
//! A tile server for raster pyramids whose tiles live in another tile source.
//!
//! Requests address a tile by `[mosaic/]level/row/column`. The address is
//! checked against the raster's resolution set, turned into a source URL and
//! fetched over HTTP with retries for partial responses. Payloads are
//! fingerprinted for `ETag`s, and gzip payloads are either inflated or passed
//! through.
//!
//! ## Architecture
//!
//! - [`raster`] - Raster configuration and the resolution set (pyramid)
//! - [`tile`] - Fingerprints, tile addresses and the tile service
//! - [`io`] - Delegate fetches, retries and gzip handling
//! - [`mod@format`] - Payload signatures and the decode boundary
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pyramid_tiles::{
//!     create_router, FetchEngine, HttpDelegate, RasterConfig, RasterSize, RouterConfig,
//!     SourceConfig, TileService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let raster = RasterConfig::new(RasterSize::new(2000, 1500)).build()?;
//!     let engine = FetchEngine::new(HttpDelegate::new(None)?);
//!     let source = SourceConfig::new("http://tiles.example.com/layer").with_suffix(".jpg");
//!
//!     let service = TileService::new(raster, engine, source);
//!     let router = create_router(service, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod raster;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, EmptyTileFile, EtagConfig, LevelsConfig, ServeConfig};
pub use error::{CodecError, ConfigError, FetchError, IoError, ParseError, TileError};
pub use format::{content_type, detect_format, stride_decode, CodecParams, ImageCodec, TileCodec};
pub use io::{Delegate, FetchEngine, FetchRequest, Fetched, HttpDelegate};
pub use raster::{
    parse_directives, BoundingBox, DataType, Pyramid, Raster, RasterConfig, RasterFormat,
    RasterSize, ResolutionLevel,
};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    build_url, tile_url, EtagDecoding, Fingerprint, SourceConfig, TileCoordinate, TileResponse,
    TileService,
};
