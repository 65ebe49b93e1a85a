//! Raster configuration values.
//!
//! Parses the raster description inputs (size, page size, bounding box, data
//! type, format) and turns a [`RasterConfig`] into a servable [`Raster`] with
//! its resolution set.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{ConfigError, ParseError};
use crate::tile::Fingerprint;

use super::pyramid::Pyramid;

// =============================================================================
// Defaults
// =============================================================================

/// Default page (tile) width and height in pixels.
pub const DEFAULT_PAGE_SIZE: u32 = 512;

/// Default band count when a size doesn't specify one.
pub const DEFAULT_BANDS: u32 = 3;

/// Default maximum tile size in bytes (4 MiB).
pub const DEFAULT_MAX_TILE_SIZE: usize = 4 * 1024 * 1024;

/// Smallest accepted maximum tile size (128 KiB).
pub const MIN_MAX_TILE_SIZE: usize = 128 * 1024;

/// Largest accepted maximum tile size (512 MiB).
pub const MAX_MAX_TILE_SIZE: usize = 512 * 1024 * 1024;

// =============================================================================
// RasterSize
// =============================================================================

/// Raster or page size: width, height, slices and bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSize {
    /// Width in pixels
    pub x: u32,

    /// Height in pixels
    pub y: u32,

    /// Number of slices (mosaic depth)
    pub z: u32,

    /// Number of bands
    pub c: u32,
}

impl RasterSize {
    /// A single slice, three band size.
    pub const fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            z: 1,
            c: DEFAULT_BANDS,
        }
    }
}

impl FromStr for RasterSize {
    type Err = ParseError;

    /// Parse `"x y"`, `"x y z"` or `"x y z c"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseError::InvalidSize(s.to_string()))?;

        match values[..] {
            [x, y] => Ok(Self::new(x, y)),
            [x, y, z] => Ok(Self { z, ..Self::new(x, y) }),
            [x, y, z, c] => Ok(Self { x, y, z, c }),
            _ => Err(ParseError::InvalidSize(s.to_string())),
        }
    }
}

// =============================================================================
// BoundingBox
// =============================================================================

/// Raster extent in projection units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// The unit square.
impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

impl FromStr for BoundingBox {
    type Err = ParseError;

    /// Parse `"xmin,ymin,xmax,ymax"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseError::InvalidBoundingBox(s.to_string()))?;

        match values[..] {
            [xmin, ymin, xmax, ymax] => Ok(Self::new(xmin, ymin, xmax, ymax)),
            _ => Err(ParseError::InvalidBoundingBox(s.to_string())),
        }
    }
}

// =============================================================================
// DataType
// =============================================================================

/// Pixel data type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    #[default]
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Look up a data type by name, case-insensitively.
    ///
    /// Unknown or absent names fall back to [`DataType::Byte`].
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return DataType::Byte;
        };
        match name.trim().to_ascii_uppercase().as_str() {
            "UINT16" => DataType::UInt16,
            "INT16" | "SHORT" => DataType::Int16,
            "UINT32" => DataType::UInt32,
            "INT32" | "INT" => DataType::Int32,
            "FLOAT32" | "FLOAT" => DataType::Float32,
            "FLOAT64" | "DOUBLE" => DataType::Float64,
            _ => DataType::Byte,
        }
    }

    /// Size of one sample in bytes.
    pub const fn size(&self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::UInt16 => "UInt16",
            DataType::Int16 => "Int16",
            DataType::UInt32 => "UInt32",
            DataType::Int32 => "Int32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        }
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(Some(s)))
    }
}

// =============================================================================
// RasterFormat
// =============================================================================

/// Tile encoding of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// Whatever the source holds (JPEG or PNG)
    Any,
    Jpeg,
    Png,
    Lerc,
}

impl RasterFormat {
    pub const fn mime_type(&self) -> &'static str {
        match self {
            RasterFormat::Any => "auto",
            RasterFormat::Jpeg => "image/jpeg",
            RasterFormat::Png => "image/png",
            RasterFormat::Lerc => "raster/lerc",
        }
    }
}

impl FromStr for RasterFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "image/jpeg" => Ok(RasterFormat::Jpeg),
            "image/png" => Ok(RasterFormat::Png),
            "raster/lerc" => Ok(RasterFormat::Lerc),
            other => Err(ParseError::UnknownFormat(other.to_string())),
        }
    }
}

// =============================================================================
// RasterConfig
// =============================================================================

/// Everything needed to describe a tiled raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterConfig {
    pub size: RasterSize,
    pub page_size: RasterSize,
    pub bbox: BoundingBox,
    pub skip_levels: usize,
    pub data_type: DataType,

    /// Tile format, derived from the data type when not set
    pub format: Option<RasterFormat>,

    /// Largest tile accepted from a source, in bytes
    pub max_tile_size: usize,

    pub no_data: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,

    /// LERC precision, derived from the data type when not set
    pub precision: Option<f64>,

    pub projection: String,

    /// Seed for the missing tile fingerprint
    pub etag_seed: Option<u64>,
}

impl RasterConfig {
    /// Configuration with defaults for everything but the size.
    pub fn new(size: RasterSize) -> Self {
        Self {
            size,
            page_size: RasterSize {
                x: DEFAULT_PAGE_SIZE,
                y: DEFAULT_PAGE_SIZE,
                z: 1,
                c: size.c,
            },
            bbox: BoundingBox::default(),
            skip_levels: 0,
            data_type: DataType::Byte,
            format: None,
            max_tile_size: DEFAULT_MAX_TILE_SIZE,
            no_data: None,
            min_value: None,
            max_value: None,
            precision: None,
            projection: "SELF".to_string(),
            etag_seed: None,
        }
    }

    pub fn with_page_size(mut self, page_size: RasterSize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_skip_levels(mut self, skip: usize) -> Self {
        self.skip_levels = skip;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_format(mut self, format: RasterFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_max_tile_size(mut self, bytes: usize) -> Self {
        self.max_tile_size = bytes;
        self
    }

    pub fn with_etag_seed(mut self, seed: u64) -> Self {
        self.etag_seed = Some(seed);
        self
    }

    /// Read a configuration from `Key Value` directive lines.
    ///
    /// `Size` is mandatory. Keys are case-insensitive and the first occurrence
    /// of a key wins. Empty lines and lines starting with `#` are ignored.
    ///
    /// ```text
    /// Size 2000 1500 1 3
    /// PageSize 512 512
    /// DataType Byte
    /// BoundingBox -180,-90,180,90
    /// ETagSeed 0h3jr6d1ou98a
    /// ```
    pub fn from_directives(text: &str) -> Result<Self, ConfigError> {
        let directives = parse_directives(text);
        let get = |key: &str| directives.get(&key.to_ascii_lowercase()).map(String::as_str);

        let size: RasterSize = get("Size")
            .ok_or(ConfigError::MissingDirective("Size"))?
            .parse()?;
        let mut config = Self::new(size);

        if let Some(page) = get("PageSize") {
            let mut page_size: RasterSize = page.parse()?;
            // Bands follow the raster unless given
            if page.split_whitespace().count() < 4 {
                page_size.c = size.c;
            }
            config.page_size = page_size;
        }
        if let Some(bytes) = get("MaxTileSize") {
            config.max_tile_size = parse_value("MaxTileSize", bytes)?;
        }
        config.data_type = DataType::from_name(get("DataType"));
        if let Some(skip) = get("SkippedLevels") {
            config.skip_levels = parse_value("SkippedLevels", skip)?;
        }
        if let Some(projection) = get("Projection") {
            config.projection = projection.to_string();
        }
        config.no_data = get("NoDataValue").map(|v| parse_value("NoDataValue", v)).transpose()?;
        config.min_value = get("MinValue").map(|v| parse_value("MinValue", v)).transpose()?;
        config.max_value = get("MaxValue").map(|v| parse_value("MaxValue", v)).transpose()?;
        if let Some(format) = get("Format") {
            config.format = Some(format.parse()?);
        }
        config.precision = get("Precision").map(|v| parse_value("Precision", v)).transpose()?;
        if let Some(bbox) = get("BoundingBox") {
            config.bbox = bbox.parse()?;
        }
        if let Some(seed) = get("ETagSeed") {
            // The flag of the seed is ignored
            config.etag_seed = Some(Fingerprint::decode(seed).value);
        }

        Ok(config)
    }

    /// Validate the configuration and build the resolution set.
    pub fn build(self) -> Result<Raster, ConfigError> {
        if !(MIN_MAX_TILE_SIZE..=MAX_MAX_TILE_SIZE).contains(&self.max_tile_size) {
            return Err(ConfigError::MaxTileSize(self.max_tile_size));
        }

        let format = self.format.unwrap_or(if self.data_type == DataType::Byte {
            RasterFormat::Any
        } else {
            RasterFormat::Lerc
        });

        if format == RasterFormat::Png && self.data_type.size() > 2 {
            return Err(ConfigError::PngDataType(self.data_type.name()));
        }

        let precision = self.precision.unwrap_or(if self.data_type.is_float() {
            0.01
        } else {
            0.5
        });

        let pyramid = Pyramid::build(self.size, self.page_size, self.bbox, self.skip_levels)?;
        let missing_etag = self.etag_seed.map(Fingerprint::for_missing_tile);

        Ok(Raster {
            format,
            precision,
            missing_etag,
            pyramid,
            config: self,
        })
    }
}

/// Split directive text into a map from lowercase key to value.
pub fn parse_directives(text: &str) -> HashMap<String, String> {
    let mut directives = HashMap::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.trim();
        let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if key.is_empty() {
            continue;
        }
        directives
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.trim().to_string());
    }
    directives
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

// =============================================================================
// Raster
// =============================================================================

/// A validated raster description with its resolution set.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    config: RasterConfig,
    format: RasterFormat,
    precision: f64,
    missing_etag: Option<Fingerprint>,
    pyramid: Pyramid,
}

impl Raster {
    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn size(&self) -> RasterSize {
        self.config.size
    }

    pub fn page_size(&self) -> RasterSize {
        self.config.page_size
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn data_type(&self) -> DataType {
        self.config.data_type
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn max_tile_size(&self) -> usize {
        self.config.max_tile_size
    }

    /// Fingerprint of the empty tile, with the missing flag set.
    pub fn missing_etag(&self) -> Option<Fingerprint> {
        self.missing_etag
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }
}

// =============================================================================
// Tests
// =============================================================================
