use async_trait::async_trait;
use reqwest::header::{ETAG, RANGE, USER_AGENT};
use reqwest::{Client, Url};
use tracing::trace;

use crate::error::IoError;

/// A byte range within a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of the range
    pub offset: u64,

    /// Number of bytes in the range
    pub size: usize,
}

impl ByteRange {
    pub const fn new(offset: u64, size: usize) -> Self {
        Self { offset, size }
    }

    /// Value for an HTTP `Range` header. The end position is inclusive.
    pub fn header_value(&self) -> String {
        let last = self.offset + (self.size as u64).saturating_sub(1);
        format!("bytes={}-{}", self.offset, last)
    }
}

/// One request handed to a [`Delegate`].
#[derive(Debug, Clone, Copy)]
pub struct DelegateRequest<'a> {
    pub url: &'a str,
    pub range: Option<ByteRange>,
    pub user_agent: Option<&'a str>,
}

impl<'a> DelegateRequest<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            range: None,
            user_agent: None,
        }
    }
}

/// What a [`Delegate`] observed while fetching into the caller's buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegateResponse {
    /// HTTP status of the response
    pub status: u16,

    /// Bytes written at the start of the buffer
    pub received: usize,

    /// Set when the body did not fit in the buffer
    pub overflow: bool,

    /// Raw `ETag` header value
    pub etag: Option<String>,
}

/// Fetch primitive used by the fetch engine.
///
/// Implementations issue a single request and copy as much of the body as
/// fits into `dst`. Only transport failures are errors: any HTTP status,
/// including 4xx and 5xx, is reported in the response.
#[async_trait]
pub trait Delegate: Send + Sync {
    async fn fetch(
        &self,
        request: &DelegateRequest<'_>,
        dst: &mut [u8],
    ) -> Result<DelegateResponse, IoError>;
}

// =============================================================================
// HTTP Delegate
// =============================================================================

/// [`Delegate`] backed by an HTTP client.
///
/// Relative URLs are resolved against the base URL, so tile paths built from
/// a prefix like `/source` work the same way a local subrequest would.
#[derive(Debug, Clone)]
pub struct HttpDelegate {
    client: Client,
    base: Option<Url>,
}

impl HttpDelegate {
    /// Create a delegate with a default client.
    pub fn new(base: Option<Url>) -> Result<Self, IoError> {
        let client = Client::builder()
            .build()
            .map_err(|e| IoError::Connection(e.to_string()))?;
        Ok(Self::with_client(client, base))
    }

    /// Create a delegate around an existing client.
    pub fn with_client(client: Client, base: Option<Url>) -> Self {
        Self { client, base }
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Resolve `url` to an absolute URL.
    pub fn resolve(&self, url: &str) -> Result<Url, IoError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .as_ref()
                .ok_or_else(|| IoError::InvalidUrl(format!("{url} (no base URL configured)")))?
                .join(url)
                .map_err(|e| IoError::InvalidUrl(format!("{url}: {e}"))),
            Err(e) => Err(IoError::InvalidUrl(format!("{url}: {e}"))),
        }
    }
}

#[async_trait]
impl Delegate for HttpDelegate {
    async fn fetch(
        &self,
        request: &DelegateRequest<'_>,
        dst: &mut [u8],
    ) -> Result<DelegateResponse, IoError> {
        let url = self.resolve(request.url)?;

        let mut builder = self.client.get(url);
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range.header_value());
        }
        if let Some(agent) = request.user_agent {
            builder = builder.header(USER_AGENT, agent);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut received = 0;
        let mut overflow = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IoError::Body(e.to_string()))?
        {
            let n = chunk.len().min(dst.len() - received);
            dst[received..received + n].copy_from_slice(&chunk[..n]);
            received += n;
            if n < chunk.len() {
                overflow = true;
                break;
            }
        }

        trace!(url = request.url, status, received, overflow, "delegate response");

        Ok(DelegateResponse {
            status,
            received,
            overflow,
            etag,
        })
    }
}
