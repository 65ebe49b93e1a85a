//! In-place gzip inflation for fixed-capacity buffers.

use std::io::{ErrorKind, Read};

use flate2::read::GzDecoder;

use crate::error::FetchError;

/// First four bytes of a gzip stream using deflate with no flags.
pub const GZIP_SIGNATURE: [u8; 4] = [0x1f, 0x8b, 0x08, 0x00];

/// Returns true if the payload starts with [`GZIP_SIGNATURE`].
pub fn is_gzip(payload: &[u8]) -> bool {
    payload.starts_with(&GZIP_SIGNATURE)
}

enum Inflate {
    Overflow,
    Failed(String),
}

/// Inflate the gzip stream held in `buf[..len]`, leaving the result at the
/// start of `buf`.
///
/// The unused tail of the buffer is tried first. If the output doesn't fit
/// there, the stream is inflated again into a scratch buffer of the same
/// capacity as `buf` and copied back. Returns the inflated size.
pub fn ungzip(buf: &mut [u8], len: usize) -> Result<usize, FetchError> {
    let capacity = buf.len();
    let (input, tail) = buf.split_at_mut(len);
    match inflate_into(input, tail) {
        Ok(size) => {
            buf.copy_within(len..len + size, 0);
            return Ok(size);
        }
        Err(Inflate::Overflow) => {}
        Err(Inflate::Failed(msg)) => return Err(FetchError::Decompression(msg)),
    }

    let mut scratch = vec![0u8; capacity];
    match inflate_into(&buf[..len], &mut scratch) {
        Ok(size) => {
            buf[..size].copy_from_slice(&scratch[..size]);
            Ok(size)
        }
        Err(Inflate::Overflow) => Err(FetchError::BufferTooSmall {
            what: "uncompressed output",
            capacity,
        }),
        Err(Inflate::Failed(msg)) => Err(FetchError::Decompression(msg)),
    }
}

/// Inflate a whole gzip payload into a new vector of at most `limit` bytes.
pub fn gunzip_to_vec(payload: &[u8], limit: usize) -> Result<Vec<u8>, FetchError> {
    let mut out = Vec::new();
    GzDecoder::new(payload)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| FetchError::Decompression(e.to_string()))?;
    if out.len() > limit {
        return Err(FetchError::BufferTooSmall {
            what: "uncompressed output",
            capacity: limit,
        });
    }
    Ok(out)
}

/// Inflate `src` into `out`, failing with `Overflow` if it doesn't fit.
fn inflate_into(src: &[u8], out: &mut [u8]) -> Result<usize, Inflate> {
    let mut decoder = GzDecoder::new(src);
    let mut written = 0;

    while written < out.len() {
        match decoder.read(&mut out[written..]) {
            Ok(0) => return Ok(written),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Inflate::Failed(e.to_string())),
        }
    }

    // Output is full, anything left in the stream means it didn't fit
    let mut extra = [0u8; 1];
    loop {
        match decoder.read(&mut extra) {
            Ok(0) => return Ok(written),
            Ok(_) => return Err(Inflate::Overflow),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Inflate::Failed(e.to_string())),
        }
    }
}
