//! Raster descriptions and their resolution sets.
//!
//! A [`RasterConfig`] describes the full-resolution raster: pixel size, page
//! size, bounding box, data type and encoding. Building it validates the
//! values and computes the [`Pyramid`] of tile grids that tile requests are
//! checked against.
//!
//! ```
//! use pyramid_tiles::raster::{RasterConfig, RasterSize};
//!
//! let raster = RasterConfig::new(RasterSize::new(2000, 1500)).build().unwrap();
//! let finest = raster.pyramid().finest();
//! assert_eq!((finest.width, finest.height), (4, 3));
//! ```

mod config;
mod pyramid;

pub use config::{
    parse_directives, BoundingBox, DataType, Raster, RasterConfig, RasterFormat, RasterSize, DEFAULT_BANDS,
    DEFAULT_MAX_TILE_SIZE, DEFAULT_PAGE_SIZE, MAX_MAX_TILE_SIZE, MIN_MAX_TILE_SIZE,
};
pub use pyramid::{expected_level_count, Pyramid, ResolutionLevel, MAX_LEVELS};
