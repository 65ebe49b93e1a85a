use thiserror::Error;

/// Errors raised while parsing tile addresses, fingerprints and raster values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The path does not have enough segments for a tile address
    #[error("Not enough path segments: need {needed}, got {found}")]
    TooFewSegments { needed: usize, found: usize },

    /// A path segment that should hold an integer does not
    #[error("Invalid tile address segment: {0:?}")]
    InvalidSegment(String),

    /// Fingerprint string is not 13 valid radix-32 digits (strict mode only)
    #[error("Invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    /// Raster size is not "x y", "x y z" or "x y z c"
    #[error("Invalid size {0:?}: expecting \"x y\", \"x y z\" or \"x y z c\"")]
    InvalidSize(String),

    /// Bounding box is not four comma separated numbers
    #[error("Invalid bounding box {0:?}: expecting four comma separated numbers")]
    InvalidBoundingBox(String),

    /// Unknown image format name
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

/// Raster configuration errors.
///
/// These are fatal at setup time: a raster that fails to configure is never served.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A configuration value failed to parse
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Raster or page size has a zero dimension
    #[error("Raster size and page size must be non-zero")]
    ZeroSize,

    /// Halving the finest grid never reached a single tile
    #[error("Pyramid does not converge to a single tile within {0} levels")]
    NoConvergence(usize),

    /// More levels skipped than the pyramid has
    #[error("Skipped levels ({skip}) must be less than the level count ({levels})")]
    SkipLevels { skip: usize, levels: usize },

    /// Max tile size outside of the accepted range
    #[error("MaxTileSize should be between 128K and 512M, got {0}")]
    MaxTileSize(usize),

    /// PNG only carries 8 and 16 bit data
    #[error("Invalid DataType for PNG: {0}")]
    PngDataType(&'static str),

    /// A mandatory directive is absent from a raster description
    #[error("{0} directive is mandatory")]
    MissingDirective(&'static str),

    /// A directive value could not be parsed
    #[error("Invalid {key} value: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Transport errors from the delegate fetch primitive
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The URL could not be resolved to something fetchable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The response body could not be read to completion
    #[error("Body read error: {0}")]
    Body(String),
}

/// Errors from the fetch engine
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The delegate request did not complete
    #[error("Request failed: {0}")]
    Transport(#[from] IoError),

    /// The remote returned a status that is neither success nor partial content
    #[error("Remote responds with {0}")]
    RemoteStatus(u16),

    /// Too many partial content responses
    #[error("Retries exhausted after {0} partial responses")]
    RetriesExhausted(u32),

    /// A byte range of zero length cannot be expressed as a range header
    #[error("Empty byte range at offset {0}")]
    EmptyRange(u64),

    /// Payload does not fit in the caller's buffer
    #[error("{what} too large for a buffer of {capacity} bytes")]
    BufferTooSmall { what: &'static str, capacity: usize },

    /// The gzip envelope could not be inflated
    #[error("ungzip error: {0}")]
    Decompression(String),
}

impl FetchError {
    /// The remote status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RemoteStatus(status) => Some(*status),
            _ => None,
        }
    }
}

/// Errors reported by pixel codecs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Payload signature does not match a known format
    #[error("Decode requested for unknown format")]
    UnknownFormat,

    /// Format is recognized but has no codec in this build
    #[error("Unsupported format: {0}")]
    Unsupported(&'static str),

    /// Decoded image does not match the expected tile geometry
    #[error("Wrong geometry: {0}")]
    Geometry(String),

    /// Output buffer cannot hold the decoded tile
    #[error("Output buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Codec library failure
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Errors that can occur while serving a tile request
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Request path is not a tile address
    #[error("Bad tile address: {0}")]
    Address(#[from] ParseError),

    /// Requested level is outside of the pyramid
    #[error("Invalid level {level}, raster has {levels} levels")]
    LevelOutOfRange { level: i64, levels: usize },

    /// Requested tile is outside of the level grid
    #[error("Tile ({row}, {column}) at level {level} is outside of {width}x{height}")]
    TileOutOfBounds {
        level: i64,
        row: i64,
        column: i64,
        width: u32,
        height: u32,
    },

    /// Mosaic index outside of the configured slices
    #[error("Invalid mosaic {mosaic}, raster has {slices} slices")]
    MosaicOutOfRange { mosaic: i64, slices: u32 },

    /// Remote fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Tile does not exist and there is no empty tile configured
    #[error("Tile not found")]
    NotFound,
}
