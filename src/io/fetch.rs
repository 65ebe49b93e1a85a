//! Remote fetch engine.
//!
//! Wraps a [`Delegate`] with the rules tile composition needs from a remote
//! read: range retries, fingerprint extraction and gzip unwrapping, all into
//! a buffer owned by the caller.
//!
//! ```text
//!            ┌──────────┐  206, retries left
//!   Init ──► │ Delegate │ ◄───────────────────┐
//!            └────┬─────┘                     │
//!                 ▼                           │
//!            ┌──────────┐                     │
//!            │ Evaluate ├─────────────────────┘
//!            └────┬─────┘
//!        success  │   other status, overflow, retries exhausted
//!                 ├──────────────────────────────────► Fail
//!                 ▼
//!           Decompress (gzip payload, enabled) ──► Done
//! ```

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::tile::{build_url, EtagDecoding, Fingerprint, TileCoordinate};

use super::delegate::{ByteRange, Delegate, DelegateRequest};
use super::gzip::{is_gzip, ungzip};

/// Default number of partial responses tolerated before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Parameters of one fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,

    /// Byte range to request; the whole resource when `None`
    pub range: Option<ByteRange>,

    /// Number of partial content responses that fail the fetch
    pub max_retries: u32,

    /// Inflate gzip payloads in place
    pub gunzip: bool,

    pub user_agent: Option<&'a str>,
}

impl<'a> FetchRequest<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            range: None,
            max_retries: DEFAULT_MAX_RETRIES,
            gunzip: true,
            user_agent: None,
        }
    }

    pub fn with_range(mut self, offset: u64, size: usize) -> Self {
        self.range = Some(ByteRange::new(offset, size));
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_gunzip(mut self, gunzip: bool) -> Self {
        self.gunzip = gunzip;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<&'a str>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Result of a successful [`FetchEngine::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    /// Payload size at the start of the buffer, after decompression
    pub size: usize,

    /// Fingerprint from the validator, or synthesized from the payload
    pub fingerprint: Fingerprint,
}

/// Result of a single pass [`FetchEngine::get_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub size: usize,

    /// Raw validator header
    pub etag: Option<String>,
}

// =============================================================================
// Fetch Engine
// =============================================================================

/// Fetches remote resources through a [`Delegate`].
///
/// The engine keeps no state between calls and can be shared freely between
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct FetchEngine<D> {
    delegate: D,
    etag_decoding: EtagDecoding,
}

impl<D: Delegate> FetchEngine<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            delegate,
            etag_decoding: EtagDecoding::default(),
        }
    }

    pub fn with_etag_decoding(mut self, mode: EtagDecoding) -> Self {
        self.etag_decoding = mode;
        self
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn etag_decoding(&self) -> EtagDecoding {
        self.etag_decoding
    }

    /// Fetch a resource into `dst`.
    ///
    /// Partial content responses are retried until `max_retries` of them have
    /// been seen. On success the payload is at the start of `dst`, inflated
    /// if it was gzip and `gunzip` is set.
    pub async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        dst: &mut [u8],
    ) -> Result<Fetched, FetchError> {
        let capacity = dst.len();
        if let Some(range) = request.range {
            if range.size == 0 {
                return Err(FetchError::EmptyRange(range.offset));
            }
            if range.size > capacity {
                return Err(FetchError::BufferTooSmall {
                    what: "requested range",
                    capacity,
                });
            }
        }

        let attempt = DelegateRequest {
            url: request.url,
            range: request.range,
            user_agent: request.user_agent,
        };

        let mut partials = 0;
        let response = loop {
            debug!(url = request.url, attempt = partials + 1, "fetching");
            let response = self.delegate.fetch(&attempt, dst).await?;
            if response.overflow {
                return Err(FetchError::BufferTooSmall {
                    what: "response",
                    capacity,
                });
            }

            match (request.range, response.status) {
                (Some(range), 200 | 206) if response.received == range.size => break response,
                (None, 200) => break response,
                (_, 206) => {
                    partials += 1;
                    if partials >= request.max_retries {
                        warn!(url = request.url, partials, "giving up on partial responses");
                        return Err(FetchError::RetriesExhausted(partials));
                    }
                    warn!(
                        url = request.url,
                        received = response.received,
                        "partial response, retrying"
                    );
                }
                (_, status) => return Err(FetchError::RemoteStatus(status)),
            }
        };

        let payload = &dst[..response.received];
        let fingerprint = match response.etag.as_deref() {
            Some(etag) => match Fingerprint::decode_with(etag, self.etag_decoding) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    warn!(url = request.url, error = %e, "ignoring invalid validator");
                    Fingerprint::for_payload(payload)
                }
            },
            None => Fingerprint::for_payload(payload),
        };

        let mut size = response.received;
        if request.gunzip && is_gzip(payload) {
            size = ungzip(dst, size)?;
            debug!(url = request.url, compressed = response.received, size, "inflated");
        }

        Ok(Fetched { size, fingerprint })
    }

    /// Read exactly `dst.len()` bytes starting at `offset`.
    ///
    /// An empty `dst` is rejected before anything is sent.
    /// Short reads are retried, up to `tries` of them. No decompression or
    /// fingerprinting is done.
    pub async fn range_read(
        &self,
        url: &str,
        offset: u64,
        dst: &mut [u8],
        tries: u32,
    ) -> Result<usize, FetchError> {
        let size = dst.len();
        if size == 0 {
            return Err(FetchError::EmptyRange(offset));
        }
        let request = DelegateRequest {
            url,
            range: Some(ByteRange::new(offset, size)),
            user_agent: None,
        };

        let mut short_reads = 0;
        loop {
            let response = self.delegate.fetch(&request, dst).await?;
            if response.overflow {
                return Err(FetchError::BufferTooSmall {
                    what: "response",
                    capacity: size,
                });
            }

            match response.status {
                200 | 206 if response.received == size => return Ok(size),
                200 | 206 => {
                    short_reads += 1;
                    if short_reads >= tries {
                        return Err(FetchError::RetriesExhausted(short_reads));
                    }
                    warn!(url, offset, received = response.received, size, "short read, retrying");
                }
                status => return Err(FetchError::RemoteStatus(status)),
            }
        }
    }

    /// Fetch a whole resource once, without retries or decompression.
    pub async fn get_response(&self, url: &str, dst: &mut [u8]) -> Result<Received, FetchError> {
        let response = self.delegate.fetch(&DelegateRequest::new(url), dst).await?;
        if response.status != 200 {
            return Err(FetchError::RemoteStatus(response.status));
        }
        if response.overflow {
            return Err(FetchError::BufferTooSmall {
                what: "response",
                capacity: dst.len(),
            });
        }

        Ok(Received {
            size: response.received,
            etag: response.etag,
        })
    }

    /// Fetch the tile at `<prefix>/tile/...<suffix>` once.
    pub async fn get_remote_tile(
        &self,
        prefix: &str,
        coord: &TileCoordinate,
        suffix: &str,
        dst: &mut [u8],
    ) -> Result<Received, FetchError> {
        let url = build_url(prefix, coord, suffix);
        self.get_response(&url, dst).await
    }
}

// =============================================================================
// Tests
// =============================================================================
