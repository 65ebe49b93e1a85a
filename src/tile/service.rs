//! Tile service for serving a raster from another tile source.
//!
//! # Request Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                              │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Parse path       4. Fetch from source               │    │
//! │  │  2. Check pyramid    5. 404 or empty → empty tile        │    │
//! │  │  3. Build URL        6. Return payload + fingerprint    │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │            │
//! │           ▼                    ▼                    ▼            │
//! │    ┌───────────┐      ┌──────────────┐    ┌──────────────────┐  │
//! │    │  Pyramid  │      │ FetchEngine  │    │    EmptyTile     │  │
//! │    └───────────┘      └──────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{FetchError, IoError, TileError};
use crate::io::{Delegate, FetchEngine, FetchRequest, DEFAULT_MAX_RETRIES};
use crate::raster::Raster;

use super::fingerprint::Fingerprint;
use super::locator::{path_segments, tile_url, TileCoordinate};

// =============================================================================
// Source Configuration
// =============================================================================

/// Where and how tiles are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Source tile URL prefix, absolute or relative to the delegate base URL
    pub source: String,

    /// Appended to every source tile URL, e.g. `.jpg` or a query string
    pub suffix: String,

    /// Inflate gzip payloads instead of passing them through
    pub decompress: bool,

    /// Partial responses tolerated per tile
    pub max_retries: u32,
}

impl SourceConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            suffix: String::new(),
            decompress: true,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

// =============================================================================
// Empty Tile
// =============================================================================

/// The tile sent in place of tiles the source doesn't have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyTile {
    pub data: Bytes,
    pub fingerprint: Fingerprint,
}

impl EmptyTile {
    /// Wrap an empty tile payload.
    ///
    /// Without a configured fingerprint one is derived from the payload. The
    /// missing flag is always set.
    pub fn new(data: Bytes, fingerprint: Option<Fingerprint>) -> Self {
        let fingerprint = fingerprint
            .or_else(|| Fingerprint::from_payload(&data))
            .map(|f| Fingerprint::new(f.value, true))
            .unwrap_or_else(|| Fingerprint::for_missing_tile(0));
        Self { data, fingerprint }
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// A tile ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResponse {
    /// Payload, possibly still gzip compressed
    pub data: Bytes,

    /// Fingerprint to send as the `ETag`
    pub fingerprint: Fingerprint,

    /// Set when this is the empty tile
    pub missing: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Serves the tiles of a raster by fetching them from a source.
///
/// Requests are checked against the raster pyramid before anything is
/// fetched. Each request fetches into its own buffer of the raster's max
/// tile size.
pub struct TileService<D: Delegate> {
    raster: Raster,
    engine: FetchEngine<D>,
    source: SourceConfig,
    empty: Option<EmptyTile>,
}

impl<D: Delegate> TileService<D> {
    pub fn new(raster: Raster, engine: FetchEngine<D>, source: SourceConfig) -> Self {
        Self {
            raster,
            engine,
            source,
            empty: None,
        }
    }

    /// Serve `data` for tiles the source doesn't have.
    ///
    /// The raster's missing tile fingerprint is used when it has one.
    pub fn with_empty_tile(mut self, data: Bytes) -> Self {
        self.empty = Some(EmptyTile::new(data, self.raster.missing_etag()));
        self
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn empty_tile(&self) -> Option<&EmptyTile> {
        self.empty.as_ref()
    }

    /// Parse a request path into a client tile coordinate.
    ///
    /// A file extension on the last segment is ignored, so `.../3/5/7.jpg`
    /// addresses the same tile as `.../3/5/7`.
    pub fn locate(&self, path: &str) -> Result<TileCoordinate, TileError> {
        let mut segments: Vec<&str> = path_segments(path).collect();
        if let Some(last) = segments.pop() {
            segments.push(last.split_once('.').map_or(last, |(stem, _ext)| stem));
        }

        let need_mosaic = self.raster.pyramid().slices() > 1;
        Ok(TileCoordinate::parse(&segments, need_mosaic)?)
    }

    /// Fetch the tile addressed by `path`.
    pub async fn get_tile(
        &self,
        path: &str,
        user_agent: Option<&str>,
    ) -> Result<TileResponse, TileError> {
        let coord = self.locate(path)?;
        let (internal, _level) = self.raster.pyramid().resolve(&coord)?;

        let url = tile_url(&self.source.source, &internal, &self.source.suffix).ok_or_else(|| {
            FetchError::Transport(IoError::InvalidUrl("empty source".to_string()))
        })?;

        let request = FetchRequest::new(&url)
            .with_max_retries(self.source.max_retries)
            .with_gunzip(self.source.decompress)
            .with_user_agent(user_agent);

        let mut buffer = vec![0u8; self.raster.max_tile_size()];
        match self.engine.fetch(&request, &mut buffer).await {
            Ok(fetched) if fetched.size > 0 => {
                buffer.truncate(fetched.size);
                debug!(tile = %coord, url = %url, size = fetched.size, "fetched tile");
                Ok(TileResponse {
                    missing: fetched.fingerprint.missing,
                    fingerprint: fetched.fingerprint,
                    data: Bytes::from(buffer),
                })
            }
            Ok(_) => self.empty_response(&coord),
            Err(e) if e.status() == Some(404) => self.empty_response(&coord),
            Err(e) => Err(e.into()),
        }
    }

    fn empty_response(&self, coord: &TileCoordinate) -> Result<TileResponse, TileError> {
        let empty = self.empty.as_ref().ok_or(TileError::NotFound)?;
        info!(tile = %coord, "serving empty tile");
        Ok(TileResponse {
            data: empty.data.clone(),
            fingerprint: empty.fingerprint,
            missing: true,
        })
    }
}
