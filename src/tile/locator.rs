//! Tile addresses in request paths and source URLs.
//!
//! Tile paths end with the tile coordinate, coarsest component first:
//!
//! ```text
//! <prefix>/tile/<level>/<row>/<column><suffix>
//! <prefix>/tile/<mosaic>/<level>/<row>/<column><suffix>
//! ```
//!
//! A mosaic of 0 is never written, so a path only carries the mosaic segment
//! when the raster has more than one slice.

use std::fmt;

use crate::error::ParseError;

// =============================================================================
// TileCoordinate
// =============================================================================

/// Address of one tile: mosaic slice, level, row and column.
///
/// Components are signed so that out of range requests can be parsed and then
/// rejected against the pyramid with a precise error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    pub mosaic: i64,
    pub level: i64,
    pub row: i64,
    pub column: i64,
}

impl TileCoordinate {
    /// Coordinate in the first mosaic slice.
    pub const fn new(level: i64, row: i64, column: i64) -> Self {
        Self {
            mosaic: 0,
            level,
            row,
            column,
        }
    }

    pub const fn with_mosaic(mosaic: i64, level: i64, row: i64, column: i64) -> Self {
        Self {
            mosaic,
            level,
            row,
            column,
        }
    }

    /// Parse a coordinate from the trailing segments of a path.
    ///
    /// The last three segments are the column, row and level, read from the
    /// end. With `need_mosaic` the segment before them is the mosaic,
    /// otherwise the mosaic is 0.
    pub fn parse<S: AsRef<str>>(segments: &[S], need_mosaic: bool) -> Result<Self, ParseError> {
        let needed = if need_mosaic { 4 } else { 3 };
        if segments.len() < needed {
            return Err(ParseError::TooFewSegments {
                needed,
                found: segments.len(),
            });
        }

        let mut tail = segments.iter().rev().map(|s| parse_segment(s.as_ref()));
        let mut next = || tail.next().unwrap_or(Ok(0));

        let column = next()?;
        let row = next()?;
        let level = next()?;
        let mosaic = if need_mosaic { next()? } else { 0 };

        Ok(Self {
            mosaic,
            level,
            row,
            column,
        })
    }

    /// Split a path on `/`, ignoring empty segments, and parse its tail.
    pub fn from_path(path: &str, need_mosaic: bool) -> Result<Self, ParseError> {
        let segments: Vec<&str> = path_segments(path).collect();
        Self::parse(&segments, need_mosaic)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mosaic != 0 {
            write!(f, "{}/", self.mosaic)?;
        }
        write!(f, "{}/{}/{}", self.level, self.row, self.column)
    }
}

// =============================================================================
// URL Builders
// =============================================================================

/// Build `<prefix>/tile[/<mosaic>]/<level>/<row>/<column><suffix>`.
pub fn build_url(prefix: &str, coord: &TileCoordinate, suffix: &str) -> String {
    format!("{prefix}/tile/{coord}{suffix}")
}

/// Build the URL of a tile under another tile source.
///
/// Unlike [`build_url`] there is no `tile` segment, and a separator is only
/// added when `source` doesn't already end with one. Returns `None` for an
/// empty source.
pub fn tile_url(source: &str, coord: &TileCoordinate, suffix: &str) -> Option<String> {
    if source.is_empty() {
        return None;
    }
    let slash = if source.ends_with('/') { "" } else { "/" };
    Some(format!("{source}{slash}{coord}{suffix}"))
}

/// Non-empty segments of a slash separated path.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_segment(segment: &str) -> Result<i64, ParseError> {
    segment
        .parse()
        .map_err(|_| ParseError::InvalidSegment(segment.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
