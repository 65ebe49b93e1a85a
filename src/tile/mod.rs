//! Tile addressing and serving.
//!
//! - [`Fingerprint`]: radix-32 tile fingerprints, sent as `ETag`s
//! - [`TileCoordinate`], [`build_url`], [`tile_url`]: tile addresses in paths
//!   and source URLs
//! - [`TileService`]: resolves requests against a raster and fetches tiles
//!   from a source
//!
//! # Example
//!
//! ```
//! use pyramid_tiles::tile::{build_url, TileCoordinate};
//!
//! let coord = TileCoordinate::with_mosaic(1, 3, 5, 7);
//! let url = build_url("/source", &coord, ".png");
//! assert_eq!(url, "/source/tile/1/3/5/7.png");
//!
//! let parsed = TileCoordinate::from_path(url.trim_end_matches(".png"), true).unwrap();
//! assert_eq!(parsed, coord);
//! ```

mod fingerprint;
mod locator;
mod service;

pub use fingerprint::{
    decode as decode_fingerprint, encode as encode_fingerprint, EtagDecoding, Fingerprint,
    FINGERPRINT_LEN, MIN_SYNTHESIS_SIZE,
};
pub use locator::{build_url, path_segments, tile_url, TileCoordinate};
pub use service::{EmptyTile, SourceConfig, TileResponse, TileService};
