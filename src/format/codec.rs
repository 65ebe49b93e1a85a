use std::borrow::Cow;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};

use crate::error::CodecError;
use crate::raster::{DataType, Raster, RasterFormat};

use super::detect::{detect_format, TileFormat};

/// JPEG quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 75;

// =============================================================================
// Codec Parameters
// =============================================================================

/// The tile a decoder is expected to produce, or an encoder to consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecParams {
    /// Tile width in pixels
    pub width: u32,

    /// Tile height in pixels
    pub height: u32,

    /// Samples per pixel
    pub bands: u32,

    pub data_type: DataType,

    /// Distance in bytes between the starts of two output rows.
    ///
    /// Defaults to a packed row when not set.
    pub line_stride: Option<usize>,

    pub no_data: Option<f64>,

    /// Encoded format; `Any` picks JPEG for bytes and PNG otherwise
    pub format: RasterFormat,

    /// JPEG quality, 1 to 100
    pub quality: u8,
}

impl CodecParams {
    pub fn new(width: u32, height: u32, bands: u32, data_type: DataType) -> Self {
        Self {
            width,
            height,
            bands,
            data_type,
            line_stride: None,
            no_data: None,
            format: RasterFormat::Any,
            quality: DEFAULT_QUALITY,
        }
    }

    /// Parameters for one page of a raster.
    pub fn for_raster(raster: &Raster) -> Self {
        let page = raster.page_size();
        Self {
            no_data: raster.config().no_data,
            format: raster.format(),
            ..Self::new(page.x, page.y, page.c, raster.data_type())
        }
    }

    pub fn with_line_stride(mut self, stride: usize) -> Self {
        self.line_stride = Some(stride);
        self
    }

    pub fn with_format(mut self, format: RasterFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// The format [`TileCodec::encode`] produces.
    pub fn output_format(&self) -> Result<TileFormat, CodecError> {
        match self.format {
            RasterFormat::Jpeg => Ok(TileFormat::Jpeg),
            RasterFormat::Png => Ok(TileFormat::Png),
            RasterFormat::Lerc => Err(CodecError::Unsupported("LERC")),
            RasterFormat::Any if self.data_type == DataType::Byte => Ok(TileFormat::Jpeg),
            RasterFormat::Any => Ok(TileFormat::Png),
        }
    }

    /// Bytes in one packed row.
    pub fn row_size(&self) -> usize {
        self.width as usize * self.bands as usize * self.data_type.size()
    }

    /// Size of a packed tile in bytes.
    pub fn min_buffer_size(&self) -> usize {
        self.row_size() * self.height as usize
    }

    fn stride(&self) -> usize {
        self.line_stride.unwrap_or_else(|| self.row_size())
    }
}

// =============================================================================
// TileCodec
// =============================================================================

/// Converts between encoded tiles and pixel buffers.
pub trait TileCodec: Send + Sync {
    /// Decode `src` into `dst`, one row every `params.line_stride` bytes.
    fn decode(&self, params: &CodecParams, src: &[u8], dst: &mut [u8]) -> Result<(), CodecError>;

    /// Encode the pixels in `src`, one row every `params.line_stride` bytes,
    /// into `dst`. Returns the encoded size.
    fn encode(&self, params: &CodecParams, src: &[u8], dst: &mut [u8])
        -> Result<usize, CodecError>;
}

/// JPEG and PNG codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TileCodec for ImageCodec {
    fn decode(&self, params: &CodecParams, src: &[u8], dst: &mut [u8]) -> Result<(), CodecError> {
        let format = match detect_format(src) {
            Some(TileFormat::Jpeg) => ImageFormat::Jpeg,
            Some(TileFormat::Png) => ImageFormat::Png,
            Some(other) => return Err(CodecError::Unsupported(other.name())),
            None => return Err(CodecError::UnknownFormat),
        };

        let img = ImageReader::with_format(Cursor::new(src), format)
            .decode()
            .map_err(|e| CodecError::Codec(e.to_string()))?;

        if img.width() != params.width || img.height() != params.height {
            return Err(CodecError::Geometry(format!(
                "decoded {}x{}, expected {}x{}",
                img.width(),
                img.height(),
                params.width,
                params.height
            )));
        }

        let color = img.color();
        let expected_pixel = params.bands as usize * params.data_type.size();
        if u32::from(color.channel_count()) != params.bands
            || usize::from(color.bytes_per_pixel()) != expected_pixel
        {
            return Err(CodecError::Geometry(format!(
                "decoded {color:?}, expected {} bands of {}",
                params.bands,
                params.data_type.name()
            )));
        }

        copy_rows(params, img.as_bytes(), dst)
    }

    fn encode(
        &self,
        params: &CodecParams,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, CodecError> {
        let format = params.output_format()?;
        let color = color_type(params)?;
        let pixels = gather_rows(params, src)?;

        let mut out = Vec::new();
        let written = match format {
            TileFormat::Jpeg => {
                if params.data_type != DataType::Byte || !matches!(params.bands, 1 | 3) {
                    return Err(CodecError::Unsupported("JPEG needs 1 or 3 byte bands"));
                }
                JpegEncoder::new_with_quality(&mut out, params.quality).write_image(
                    &pixels,
                    params.width,
                    params.height,
                    color,
                )
            }
            TileFormat::Png => {
                PngEncoder::new(&mut out).write_image(&pixels, params.width, params.height, color)
            }
            other => return Err(CodecError::Unsupported(other.name())),
        };
        written.map_err(|e| CodecError::Codec(e.to_string()))?;

        if out.len() > dst.len() {
            return Err(CodecError::BufferTooSmall {
                required: out.len(),
                available: dst.len(),
            });
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }
}

/// Pixel layout the `image` encoders expect for these parameters.
///
/// 16 bit samples are in native byte order.
fn color_type(params: &CodecParams) -> Result<ExtendedColorType, CodecError> {
    let color = match (params.data_type.size(), params.bands) {
        (1, 1) => ExtendedColorType::L8,
        (1, 2) => ExtendedColorType::La8,
        (1, 3) => ExtendedColorType::Rgb8,
        (1, 4) => ExtendedColorType::Rgba8,
        (2, 1) => ExtendedColorType::L16,
        (2, 2) => ExtendedColorType::La16,
        (2, 3) => ExtendedColorType::Rgb16,
        (2, 4) => ExtendedColorType::Rgba16,
        (size, bands) if size > 2 && bands > 0 => {
            return Err(CodecError::Unsupported("samples wider than 16 bits"))
        }
        (_, bands) => return Err(CodecError::Geometry(format!("cannot encode {bands} bands"))),
    };
    Ok(color)
}

/// Packed rows read from `src` at the configured stride.
fn gather_rows<'a>(params: &CodecParams, src: &'a [u8]) -> Result<Cow<'a, [u8]>, CodecError> {
    let row = params.row_size();
    let stride = params.stride();
    if stride < row {
        return Err(CodecError::Geometry(format!(
            "line stride {stride} is shorter than a row of {row} bytes"
        )));
    }

    let rows = params.height as usize;
    let required = match rows {
        0 => 0,
        n => stride * (n - 1) + row,
    };
    if src.len() < required {
        return Err(CodecError::Geometry(format!(
            "source holds {} bytes, tile needs {required}",
            src.len()
        )));
    }

    if stride == row {
        return Ok(Cow::Borrowed(&src[..required]));
    }
    let mut packed = Vec::with_capacity(row * rows);
    for line in 0..rows {
        let start = line * stride;
        packed.extend_from_slice(&src[start..start + row]);
    }
    Ok(Cow::Owned(packed))
}

/// Copy packed rows from `pixels` into `dst` at the configured stride.
fn copy_rows(params: &CodecParams, pixels: &[u8], dst: &mut [u8]) -> Result<(), CodecError> {
    let row = params.row_size();
    let stride = params.stride();
    if stride < row {
        return Err(CodecError::Geometry(format!(
            "line stride {stride} is shorter than a row of {row} bytes"
        )));
    }

    let rows = params.height as usize;
    let required = match rows {
        0 => 0,
        n => stride * (n - 1) + row,
    };
    if dst.len() < required {
        return Err(CodecError::BufferTooSmall {
            required,
            available: dst.len(),
        });
    }

    for (line, packed) in pixels.chunks_exact(row).take(rows).enumerate() {
        let start = line * stride;
        dst[start..start + row].copy_from_slice(packed);
    }
    Ok(())
}

/// Decode a tile with the codec matching its signature.
///
/// Returns the detected format. LERC payloads are recognized but have no
/// decoder here.
pub fn stride_decode(
    params: &CodecParams,
    src: &[u8],
    dst: &mut [u8],
) -> Result<TileFormat, CodecError> {
    match detect_format(src) {
        Some(format @ (TileFormat::Jpeg | TileFormat::Png)) => {
            ImageCodec.decode(params, src, dst)?;
            Ok(format)
        }
        Some(TileFormat::Lerc) => Err(CodecError::Unsupported("LERC")),
        _ => Err(CodecError::UnknownFormat),
    }
}
