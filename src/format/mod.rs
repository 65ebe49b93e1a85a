//! Tile payload formats.
//!
//! - [`detect_format`] and [`content_type`] classify payloads by signature
//! - [`TileCodec`] is the decode and encode boundary, with [`ImageCodec`]
//!   handling JPEG and PNG through the `image` crate
//! - [`stride_decode`] dispatches a payload to the right codec

mod codec;
pub mod detect;

pub use codec::{stride_decode, CodecParams, ImageCodec, TileCodec, DEFAULT_QUALITY};
pub use detect::{content_type, detect_format, TileFormat, OCTET_STREAM};
