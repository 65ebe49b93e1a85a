//! Command-line configuration for pyramid-tiles.
//!
//! The binary has three subcommands:
//!
//! - `serve` - run the tile server in front of a source
//! - `levels` - print the resolution set of a raster
//! - `etag` - encode or decode tile fingerprints
//!
//! # Environment Variables
//!
//! Every `serve` option can also be set through a `PYRAMID_` variable:
//!
//! - `PYRAMID_HOST` - Server bind address (default: 0.0.0.0)
//! - `PYRAMID_PORT` - Server port (default: 3000)
//! - `PYRAMID_RASTER` - Raster directive file (required)
//! - `PYRAMID_SOURCE` - Source tile URL prefix (required)
//! - `PYRAMID_BASE_URL` - Base URL that relative sources resolve against
//! - `PYRAMID_SUFFIX` - Suffix appended to source tile URLs
//! - `PYRAMID_EMPTY_TILE` - Payload served for missing tiles, as
//!   `[size [offset]] path`
//! - `PYRAMID_ETAG_SEED` - Overrides the raster's `ETagSeed`
//! - `PYRAMID_MAX_RETRIES` - Partial responses tolerated per tile (default: 4)
//! - `PYRAMID_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `PYRAMID_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::io::DEFAULT_MAX_RETRIES;
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::tile::{EtagDecoding, Fingerprint};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// CLI
// =============================================================================

/// pyramid-tiles - Serve a tiled raster pyramid from an upstream tile source.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyramid-tiles")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the tile server.
    Serve(ServeConfig),

    /// Print the resolution levels of a raster.
    Levels(LevelsConfig),

    /// Encode a value as a fingerprint, or decode a fingerprint.
    Etag(EtagConfig),
}

// =============================================================================
// Empty Tile
// =============================================================================

/// A slice of a local file holding the empty tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyTileFile {
    pub path: PathBuf,

    /// Bytes to read, the whole file when 0
    pub size: u64,

    pub offset: u64,
}

impl EmptyTileFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            offset: 0,
        }
    }

    pub fn with_slice(mut self, size: u64, offset: u64) -> Self {
        self.size = size;
        self.offset = offset;
        self
    }

    /// Read the slice, failing if it is larger than `limit` or the file ends
    /// before the slice does.
    pub fn read(&self, limit: usize) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let size = match self.size {
            0 => file.metadata()?.len().saturating_sub(self.offset),
            size => size,
        };
        if size > limit as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{size} bytes is more than the {limit} byte limit"),
            ));
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut data = vec![0u8; size as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }
}

impl FromStr for EmptyTileFile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        let mut numbers = Vec::with_capacity(2);
        while numbers.len() < 2 {
            let Some((head, tail)) = rest.split_once(char::is_whitespace) else {
                break;
            };
            let Ok(n) = head.parse::<u64>() else {
                break;
            };
            numbers.push(n);
            rest = tail.trim_start();
        }

        if rest.is_empty() {
            return Err(format!("no file name in empty tile {s:?}"));
        }
        let size = numbers.first().copied().unwrap_or(0);
        let offset = numbers.get(1).copied().unwrap_or(0);
        Ok(Self::new(rest).with_slice(size, offset))
    }
}

impl fmt::Display for EmptyTileFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.size, self.offset) {
            (0, 0) => write!(f, "{}", self.path.display()),
            (size, offset) => write!(f, "{} [{size} bytes at {offset}]", self.path.display()),
        }
    }
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PYRAMID_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PYRAMID_PORT")]
    pub port: u16,

    // =========================================================================
    // Raster Configuration
    // =========================================================================
    /// Raster directive file (`Size`, `PageSize`, `DataType`, ...).
    #[arg(short, long, env = "PYRAMID_RASTER")]
    pub raster: PathBuf,

    /// Fingerprint seed for missing tiles, overriding the raster file.
    #[arg(long, env = "PYRAMID_ETAG_SEED")]
    pub etag_seed: Option<String>,

    /// Payload served for missing tiles: `[size [offset]] path`.
    ///
    /// Without a size, or with size 0, the whole file is used.
    #[arg(long, env = "PYRAMID_EMPTY_TILE")]
    pub empty_tile: Option<EmptyTileFile>,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Source tile URL prefix, e.g. `http://host/layer` or `/layer`.
    #[arg(short, long, env = "PYRAMID_SOURCE")]
    pub source: String,

    /// Base URL that relative source prefixes are resolved against.
    #[arg(long, env = "PYRAMID_BASE_URL")]
    pub base_url: Option<String>,

    /// Suffix appended to every source tile URL.
    #[arg(long, default_value = "", env = "PYRAMID_SUFFIX")]
    pub suffix: String,

    /// Pass gzip payloads through instead of inflating them.
    #[arg(long, default_value_t = false, env = "PYRAMID_NO_DECOMPRESS")]
    pub no_decompress: bool,

    /// Partial responses tolerated per tile before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, env = "PYRAMID_MAX_RETRIES")]
    pub max_retries: u32,

    /// Reject malformed source ETags and fingerprint the payload instead.
    #[arg(long, default_value_t = false, env = "PYRAMID_STRICT_ETAGS")]
    pub strict_etags: bool,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PYRAMID_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PYRAMID_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("Source is required. Set --source or PYRAMID_SOURCE".to_string());
        }

        let absolute = Url::parse(&self.source).is_ok();
        match &self.base_url {
            Some(base) => {
                Url::parse(base).map_err(|e| format!("Invalid base URL '{}': {}", base, e))?;
            }
            None if !absolute => {
                return Err(format!(
                    "Source '{}' is relative. Set --base-url or use an absolute URL",
                    self.source
                ));
            }
            None => {}
        }

        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }

        if self.max_retries == 0 {
            return Err("max_retries must be greater than 0".to_string());
        }

        if let Some(seed) = &self.etag_seed {
            Fingerprint::decode_strict(seed)
                .map_err(|e| format!("Invalid ETag seed: {}", e))?;
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the delegate base URL, if one was given.
    pub fn parsed_base_url(&self) -> Option<Url> {
        self.base_url.as_deref().and_then(|b| Url::parse(b).ok())
    }

    /// How source ETags are decoded.
    pub fn etag_decoding(&self) -> EtagDecoding {
        if self.strict_etags {
            EtagDecoding::Strict
        } else {
            EtagDecoding::Lenient
        }
    }
}

// =============================================================================
// Levels
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct LevelsConfig {
    /// Raster directive file.
    pub raster: PathBuf,

    /// Print as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

// =============================================================================
// Etag
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct EtagConfig {
    /// A decimal value to encode, or a fingerprint to decode with `--decode`.
    pub input: String,

    /// Decode the input instead of encoding it.
    #[arg(short, long, default_value_t = false)]
    pub decode: bool,

    /// Set the flag bit when encoding.
    #[arg(long, default_value_t = false)]
    pub missing: bool,
}

// =============================================================================
// Tests
// =============================================================================
