//! Fetch engine tests against the mock upstream.
//!
//! Tests verify:
//! - Range reads and short read retries
//! - Whole-resource fetches into fixed buffers
//! - Gzip inflation in place or through a scratch buffer
//! - Remote tile URLs built from a prefix

use pyramid_tiles::error::FetchError;
use pyramid_tiles::io::{FetchEngine, FetchRequest};
use pyramid_tiles::tile::{EtagDecoding, Fingerprint, TileCoordinate};

use super::test_utils::{create_test_png, gzip, MockResponse, MockSource};

const URL: &str = "http://upstream.test/data.bin";

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

// =============================================================================
// Range Reads
// =============================================================================

#[tokio::test]
async fn test_fetch_range() {
    let data = sample(4096);
    let source = MockSource::new().with_url(URL, MockResponse {
        status: 206,
        ..MockResponse::ok(data.clone())
    });
    let engine = FetchEngine::new(source);

    let mut dst = vec![0u8; 1024];
    let request = FetchRequest::new(URL).with_range(1000, 512);
    let fetched = engine.fetch(&request, &mut dst).await.unwrap();

    assert_eq!(fetched.size, 512);
    assert_eq!(&dst[..512], &data[1000..1512]);
}

#[tokio::test]
async fn test_fetch_range_larger_than_buffer() {
    let source = MockSource::new();
    let engine = FetchEngine::new(source.clone());

    let mut dst = vec![0u8; 100];
    let request = FetchRequest::new(URL).with_range(0, 101);
    let err = engine.fetch(&request, &mut dst).await.unwrap_err();

    assert!(matches!(
        err,
        FetchError::BufferTooSmall {
            what: "requested range",
            capacity: 100
        }
    ));
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_range_read_retries_short_reads() {
    let data = sample(256);
    let source = MockSource::new().with_script(
        URL,
        vec![
            MockResponse {
                status: 206,
                ..MockResponse::ok(data[..10].to_vec())
            },
            MockResponse {
                status: 206,
                ..MockResponse::ok(data.clone())
            },
        ],
    );
    let engine = FetchEngine::new(source.clone());

    let mut dst = vec![0u8; 64];
    let size = engine.range_read(URL, 16, &mut dst, 3).await.unwrap();

    assert_eq!(size, 64);
    assert_eq!(&dst[..], &data[16..80]);
    assert_eq!(source.request_count(), 2);
}

#[tokio::test]
async fn test_range_read_gives_up() {
    let source = MockSource::new().with_url(URL, MockResponse::ok(sample(8)));
    let engine = FetchEngine::new(source.clone());

    let mut dst = vec![0u8; 64];
    let err = engine.range_read(URL, 0, &mut dst, 3).await.unwrap_err();

    assert!(matches!(err, FetchError::RetriesExhausted(3)));
    assert_eq!(source.request_count(), 3);
}

// =============================================================================
// Whole Resources
// =============================================================================

#[tokio::test]
async fn test_fetch_response_too_large() {
    let source = MockSource::new().with_url(URL, MockResponse::ok(sample(2048)));
    let engine = FetchEngine::new(source);

    let mut dst = vec![0u8; 1024];
    let err = engine
        .fetch(&FetchRequest::new(URL), &mut dst)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::BufferTooSmall {
            what: "response",
            capacity: 1024
        }
    ));
}

#[tokio::test]
async fn test_fetch_gzip_in_place() {
    let png = create_test_png(64, 64);
    let packed = gzip(&png);
    let source = MockSource::new().with_url(URL, MockResponse::ok(packed.clone()));
    let engine = FetchEngine::new(source);

    let mut dst = vec![0u8; png.len() + packed.len()];
    let fetched = engine.fetch(&FetchRequest::new(URL), &mut dst).await.unwrap();
    assert_eq!(fetched.size, png.len());
    assert_eq!(&dst[..fetched.size], &png[..]);

    // Fingerprint comes from the compressed payload
    assert_eq!(fetched.fingerprint, Fingerprint::for_payload(&packed));

    let request = FetchRequest::new(URL).with_gunzip(false);
    let fetched = engine.fetch(&request, &mut dst).await.unwrap();
    assert_eq!(&dst[..fetched.size], &packed[..]);
}

#[tokio::test]
async fn test_fetch_strict_etag_falls_back_to_payload() {
    let data = sample(1024);
    let source = MockSource::new().with_url(URL, MockResponse::ok(data.clone()).with_etag("W/\"abc\""));

    let mut dst = vec![0u8; 2048];
    let strict = FetchEngine::new(source.clone()).with_etag_decoding(EtagDecoding::Strict);
    let fetched = strict.fetch(&FetchRequest::new(URL), &mut dst).await.unwrap();
    assert_eq!(Some(fetched.fingerprint), Fingerprint::from_payload(&data));

    let lenient = FetchEngine::new(source);
    let fetched = lenient.fetch(&FetchRequest::new(URL), &mut dst).await.unwrap();
    assert_eq!(fetched.fingerprint, Fingerprint::decode("W/\"abc\""));
}

#[tokio::test]
async fn test_fetch_small_payload_without_validator() {
    let source = MockSource::new().with_url(URL, MockResponse::ok(sample(100)));
    let engine = FetchEngine::new(source);

    let mut dst = vec![0u8; 1024];
    let fetched = engine.fetch(&FetchRequest::new(URL), &mut dst).await.unwrap();

    assert_eq!(fetched.size, 100);
    assert_eq!(fetched.fingerprint, Fingerprint::new(0, false));
    assert_eq!(fetched.fingerprint.quoted(), "\"0000000000000\"");
}

#[tokio::test]
async fn test_fetch_gzip_through_scratch_buffer() {
    let data = sample(8192);
    let packed = gzip(&data);
    let source = MockSource::new().with_url(URL, MockResponse::ok(packed.clone()));
    let engine = FetchEngine::new(source);

    // Room for the output, but not behind the compressed bytes
    let capacity = data.len() + packed.len() / 2;
    assert!(capacity - packed.len() < data.len());
    let mut dst = vec![0u8; capacity];
    let fetched = engine.fetch(&FetchRequest::new(URL), &mut dst).await.unwrap();

    assert_eq!(fetched.size, data.len());
    assert_eq!(&dst[..fetched.size], &data[..]);
}

#[tokio::test]
async fn test_fetch_gzip_output_too_large() {
    let data = sample(8192);
    let packed = gzip(&data);
    let source = MockSource::new().with_url(URL, MockResponse::ok(packed.clone()));
    let engine = FetchEngine::new(source);

    let capacity = data.len() - 1;
    assert!(capacity > packed.len());
    let mut dst = vec![0u8; capacity];
    let err = engine
        .fetch(&FetchRequest::new(URL), &mut dst)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::BufferTooSmall {
            what: "uncompressed output",
            capacity: c
        } if c == capacity
    ));
}

#[tokio::test]
async fn test_fetch_empty_range() {
    let source = MockSource::new().with_url(URL, MockResponse::ok(sample(64)));
    let engine = FetchEngine::new(source.clone());

    let mut dst = vec![0u8; 64];
    let request = FetchRequest::new(URL).with_range(32, 0);
    let err = engine.fetch(&request, &mut dst).await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyRange(32)));

    let err = engine.range_read(URL, 32, &mut [], 3).await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyRange(32)));
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_get_remote_tile() {
    let png = create_test_png(8, 8);
    let source = MockSource::new().with_url(
        "http://upstream.test/mrf/tile/1/4/2/3.png",
        MockResponse::ok(png.clone()).with_etag("0000000000001"),
    );
    let engine = FetchEngine::new(source);

    let mut dst = vec![0u8; 4096];
    let coord = TileCoordinate::with_mosaic(1, 4, 2, 3);
    let received = engine
        .get_remote_tile("http://upstream.test/mrf", &coord, ".png", &mut dst)
        .await
        .unwrap();

    assert_eq!(received.size, png.len());
    assert_eq!(received.etag.as_deref(), Some("0000000000001"));

    let coord = TileCoordinate::new(0, 0, 0);
    let err = engine
        .get_remote_tile("http://upstream.test/mrf", &coord, ".png", &mut dst)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}
