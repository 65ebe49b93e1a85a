//! Resolution sets for tiled rasters.
//!
//! A raster of a given pixel size, cut into fixed-size tiles, is served as a
//! pyramid of progressively coarser tile grids. Each coarser level halves the
//! grid of the level below it (rounding up) and doubles the resolution, until
//! a single tile covers the whole raster.
//!
//! Levels are stored coarsest first, the way tile protocols count them:
//!
//! ```text
//! index 0            1x1      res * 4
//! index 1            2x2      res * 2
//! index 2 (finest)   4x3      res
//! ```

use crate::error::{ConfigError, TileError};
use crate::tile::TileCoordinate;

use super::config::{BoundingBox, RasterSize};

/// Upper bound on the number of halvings while building a pyramid.
pub const MAX_LEVELS: usize = 64;

// =============================================================================
// ResolutionLevel
// =============================================================================

/// One level of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionLevel {
    /// Horizontal resolution, bounding box units per pixel
    pub resolution_x: f64,

    /// Vertical resolution, bounding box units per pixel
    pub resolution_y: f64,

    /// Grid width in tiles
    pub width: u32,

    /// Grid height in tiles
    pub height: u32,

    /// Number of tiles stored in all finer levels, all slices included
    pub tile_offset: u64,
}

impl ResolutionLevel {
    /// Number of tiles in one slice of this level.
    pub fn tile_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether `(row, column)` falls inside the grid.
    pub fn contains(&self, row: i64, column: i64) -> bool {
        (0..i64::from(self.height)).contains(&row) && (0..i64::from(self.width)).contains(&column)
    }

    /// Row-major index of a tile within one slice of this level.
    pub fn tile_index(&self, row: i64, column: i64) -> Option<u64> {
        if !self.contains(row, column) {
            return None;
        }
        Some(row as u64 * u64::from(self.width) + column as u64)
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// The resolution set of a raster, coarsest level first.
///
/// Built once from the raster configuration and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    levels: Vec<ResolutionLevel>,
    skip: usize,
    slices: u32,
}

impl Pyramid {
    /// Build the resolution set for a raster.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroSize`] if any raster or page dimension is zero
    /// - [`ConfigError::NoConvergence`] if the grid does not reach 1x1 within [`MAX_LEVELS`]
    /// - [`ConfigError::SkipLevels`] if `skip` is not less than the level count
    pub fn build(
        size: RasterSize,
        page: RasterSize,
        bbox: BoundingBox,
        skip: usize,
    ) -> Result<Self, ConfigError> {
        if size.x == 0 || size.y == 0 || page.x == 0 || page.y == 0 {
            return Err(ConfigError::ZeroSize);
        }

        let slices = size.z.max(1);
        let mut level = ResolutionLevel {
            resolution_x: bbox.width() / f64::from(size.x),
            resolution_y: bbox.height() / f64::from(size.y),
            width: size.x.div_ceil(page.x),
            height: size.y.div_ceil(page.y),
            tile_offset: 0,
        };

        // Finest first, then reversed
        let mut levels = Vec::new();
        loop {
            levels.push(level);
            if level.width == 1 && level.height == 1 {
                break;
            }
            if levels.len() >= MAX_LEVELS {
                return Err(ConfigError::NoConvergence(MAX_LEVELS));
            }
            level.tile_offset += u64::from(slices) * level.tile_count();
            level.width = level.width.div_ceil(2);
            level.height = level.height.div_ceil(2);
            level.resolution_x *= 2.0;
            level.resolution_y *= 2.0;
        }
        levels.reverse();

        if skip >= levels.len() {
            return Err(ConfigError::SkipLevels {
                skip,
                levels: levels.len(),
            });
        }

        Ok(Self {
            levels,
            skip,
            slices,
        })
    }

    /// Number of levels, skipped ones included.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[ResolutionLevel] {
        &self.levels
    }

    /// Level at `index`, 0 being the single tile level.
    pub fn level(&self, index: usize) -> Option<&ResolutionLevel> {
        self.levels.get(index)
    }

    /// The single tile level.
    pub fn coarsest(&self) -> &ResolutionLevel {
        &self.levels[0]
    }

    /// The full resolution level.
    pub fn finest(&self) -> &ResolutionLevel {
        &self.levels[self.levels.len() - 1]
    }

    /// Number of coarse levels hidden from clients.
    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Number of slices (mosaic depth) per level.
    pub fn slices(&self) -> u32 {
        self.slices
    }

    /// Total number of tiles in the pyramid, all slices included.
    pub fn total_tiles(&self) -> u64 {
        let top = self.coarsest();
        top.tile_offset + u64::from(self.slices) * top.tile_count()
    }

    /// Validate a client coordinate and map it onto the level table.
    ///
    /// Client levels count from the first level that is not skipped. The
    /// returned coordinate carries the internal level index.
    pub fn resolve(
        &self,
        coord: &TileCoordinate,
    ) -> Result<(TileCoordinate, &ResolutionLevel), TileError> {
        let served = self.levels.len() - self.skip;
        if coord.level < 0 || coord.level >= served as i64 {
            return Err(TileError::LevelOutOfRange {
                level: coord.level,
                levels: served,
            });
        }
        if coord.mosaic < 0 || coord.mosaic >= i64::from(self.slices) {
            return Err(TileError::MosaicOutOfRange {
                mosaic: coord.mosaic,
                slices: self.slices,
            });
        }

        let index = coord.level as usize + self.skip;
        let level = &self.levels[index];
        if !level.contains(coord.row, coord.column) {
            return Err(TileError::TileOutOfBounds {
                level: coord.level,
                row: coord.row,
                column: coord.column,
                width: level.width,
                height: level.height,
            });
        }

        let internal = TileCoordinate {
            level: index as i64,
            ..*coord
        };
        Ok((internal, level))
    }
}

/// Closed form for the level count of a finest grid of `width x height` tiles.
pub fn expected_level_count(width: u32, height: u32) -> usize {
    let largest = width.max(height);
    if largest <= 1 {
        return 1;
    }
    2 + (u32::BITS - 1 - (largest - 1).leading_zeros()) as usize
}

// =============================================================================
// Tests
// =============================================================================
