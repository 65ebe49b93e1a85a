//! Test utilities for integration tests.
//!
//! Provides a mock upstream tile source and helpers for building rasters,
//! routers and tile payloads.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;

use pyramid_tiles::error::IoError;
use pyramid_tiles::io::{Delegate, DelegateRequest, DelegateResponse, FetchEngine};
use pyramid_tiles::raster::{Raster, RasterConfig, RasterSize};
use pyramid_tiles::tile::{SourceConfig, TileService};

/// Prefix of every upstream URL served by [`MockSource`].
pub const SOURCE: &str = "http://upstream.test/layer";

// =============================================================================
// Mock Upstream Source
// =============================================================================

/// A canned upstream response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

impl MockResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            etag: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            etag: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// A mock upstream that serves responses by URL and records every request.
///
/// Unknown URLs answer 404. A URL can also be given a queue of responses,
/// consumed one per request before falling back to its fixed response.
#[derive(Clone, Default)]
pub struct MockSource {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    requests: Arc<Mutex<Vec<String>>>,
    user_agents: Arc<Mutex<Vec<Option<String>>>>,
    request_count: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for the tile at `level/row/column` under [`SOURCE`].
    pub fn with_tile(self, level: u32, row: u32, column: u32, response: MockResponse) -> Self {
        self.with_url(format!("{SOURCE}/{level}/{row}/{column}"), response)
    }

    pub fn with_url(self, url: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), response);
        self
    }

    /// Answer the next requests for `url` with `responses`, in order.
    pub fn with_script(self, url: impl Into<String>, responses: Vec<MockResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.into(), responses.into());
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn user_agents(&self) -> Vec<Option<String>> {
        self.user_agents.lock().unwrap().clone()
    }

    fn next_response(&self, url: &str) -> MockResponse {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        scripted
            .or_else(|| self.responses.lock().unwrap().get(url).cloned())
            .unwrap_or_else(|| MockResponse::status(404))
    }
}

#[async_trait]
impl Delegate for MockSource {
    async fn fetch(
        &self,
        request: &DelegateRequest<'_>,
        dst: &mut [u8],
    ) -> Result<DelegateResponse, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.url.to_string());
        self.user_agents
            .lock()
            .unwrap()
            .push(request.user_agent.map(str::to_string));

        if request.url.contains("unreachable") {
            return Err(IoError::Connection("connection refused".to_string()));
        }

        let response = self.next_response(request.url);
        let body = match request.range {
            Some(range) => {
                let start = (range.offset as usize).min(response.body.len());
                let end = (start + range.size).min(response.body.len());
                &response.body[start..end]
            }
            None => &response.body[..],
        };

        let received = body.len().min(dst.len());
        dst[..received].copy_from_slice(&body[..received]);
        Ok(DelegateResponse {
            status: response.status,
            received,
            overflow: body.len() > dst.len(),
            etag: response.etag,
        })
    }
}

// =============================================================================
// Service Builders
// =============================================================================

/// A 1024x1024 raster in 512 pixel pages: a 1x1 level over a 2x2 level.
pub fn test_raster() -> Raster {
    RasterConfig::new(RasterSize::new(1024, 1024))
        .with_etag_seed(42)
        .build()
        .unwrap()
}

pub fn test_service(source: MockSource) -> TileService<MockSource> {
    TileService::new(test_raster(), FetchEngine::new(source), SourceConfig::new(SOURCE))
}

// =============================================================================
// Payloads
// =============================================================================

/// Create a test JPEG image with a simple gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let val = ((x + y) % 256) as u8;
        Luma([val])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a test RGB PNG image.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Gzip `data` the way an upstream storing compressed tiles would.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Check if data is a valid JPEG (starts with SOI marker and ends with EOI).
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}
