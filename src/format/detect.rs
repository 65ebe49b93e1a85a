//! Payload signature detection.
//!
//! Tiles are identified by their first bytes, the same way a tile source
//! labels them when the configured format is "any":
//!
//! - **JPEG**: `ff d8 ff`
//! - **PNG**: `89 50 4e 47`
//! - **LERC**: `CntZ`
//! - **gzip**: `1f 8b 08 00`, a compressed envelope around one of the above

use crate::io::GZIP_SIGNATURE;

/// JPEG start of image marker followed by the next marker prefix.
pub const JPEG_SIGNATURE: [u8; 3] = [0xff, 0xd8, 0xff];

pub const PNG_SIGNATURE: [u8; 4] = [0x89, b'P', b'N', b'G'];

pub const LERC_SIGNATURE: [u8; 4] = *b"CntZ";

/// Content type for payloads with no recognized signature.
pub const OCTET_STREAM: &str = "application/octet-stream";

// =============================================================================
// TileFormat
// =============================================================================

/// Encoding of a tile payload, as detected from its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Jpeg,
    Png,
    Lerc,
    Gzip,
}

impl TileFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "JPEG",
            TileFormat::Png => "PNG",
            TileFormat::Lerc => "LERC",
            TileFormat::Gzip => "gzip",
        }
    }
}

/// Detect the format of a tile payload from its first bytes.
pub fn detect_format(payload: &[u8]) -> Option<TileFormat> {
    if payload.starts_with(&JPEG_SIGNATURE) {
        Some(TileFormat::Jpeg)
    } else if payload.starts_with(&PNG_SIGNATURE) {
        Some(TileFormat::Png)
    } else if payload.starts_with(&LERC_SIGNATURE) {
        Some(TileFormat::Lerc)
    } else if payload.starts_with(&GZIP_SIGNATURE) {
        Some(TileFormat::Gzip)
    } else {
        None
    }
}

/// Content type to send a payload with.
///
/// Only JPEG and PNG have an image type; LERC, gzip and anything else is sent
/// as an octet stream. A gzip payload additionally needs a
/// `Content-Encoding: gzip` header.
pub fn content_type(payload: &[u8]) -> &'static str {
    match detect_format(payload) {
        Some(TileFormat::Jpeg) => "image/jpeg",
        Some(TileFormat::Png) => "image/png",
        _ => OCTET_STREAM,
    }
}
