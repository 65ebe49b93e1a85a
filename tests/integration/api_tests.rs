//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile retrieval, content types and upstream URLs
//! - ETags and conditional requests
//! - Empty tiles for missing upstream tiles
//! - Gzip pass-through and inflation
//! - HTTP error codes and JSON error bodies

use axum::body::{Body, Bytes};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pyramid_tiles::io::FetchEngine;
use pyramid_tiles::raster::{RasterConfig, RasterSize};
use pyramid_tiles::tile::{Fingerprint, SourceConfig, TileService};
use pyramid_tiles::{create_router, RouterConfig};

use super::test_utils::{
    create_test_jpeg, create_test_png, gzip, is_valid_jpeg, test_raster, test_service,
    MockResponse, MockSource, SOURCE,
};

fn router(service: TileService<MockSource>) -> Router {
    create_router(service, RouterConfig::default())
}

async fn get(router: Router, uri: &str, headers: &[(header::HeaderName, &str)]) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(name.clone(), *value);
    }
    router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn error_type(response: Response<Body>) -> String {
    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    error["error"].as_str().unwrap().to_string()
}

// =============================================================================
// Basic Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let jpeg = create_test_jpeg(64, 64, 80);
    let source = MockSource::new().with_tile(1, 1, 0, MockResponse::ok(jpeg.clone()));

    let response = get(router(test_service(source.clone())), "/tile/1/1/0", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );
    assert!(response.headers().contains_key(header::ETAG));
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(&body[..], &jpeg[..]);
    assert_eq!(source.requests(), vec![format!("{SOURCE}/1/1/0")]);
}

#[tokio::test]
async fn test_tile_retrieval_ignores_extension() {
    let png = create_test_png(16, 16);
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(png));

    let response = get(router(test_service(source)), "/tile/0/0/0.png", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn test_unknown_payload_is_octet_stream() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(b"CntZImage ".to_vec()));

    let response = get(router(test_service(source)), "/tile/0/0/0", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    // Too small to sample and no upstream validator
    assert_eq!(response.headers().get(header::ETAG).unwrap(), "\"0000000000000\"");
}

#[tokio::test]
async fn test_small_payload_without_validator_not_modified() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(vec![0x5a; 100]));
    let app = router(test_service(source));

    let response = get(app.clone(), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = Fingerprint::new(0, false).quoted();
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());

    let response = get(app, "/tile/0/0/0", &[(header::IF_NONE_MATCH, etag.as_str())]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());
}

#[tokio::test]
async fn test_user_agent_forwarded() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(create_test_png(8, 8)));

    let response = get(
        router(test_service(source.clone())),
        "/tile/0/0/0",
        &[(header::USER_AGENT, "viewer/1.0")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.user_agents(), vec![Some("viewer/1.0".to_string())]);
}

#[tokio::test]
async fn test_skipped_levels_map_to_finer_levels() {
    let raster = RasterConfig::new(RasterSize::new(1024, 1024))
        .with_skip_levels(1)
        .build()
        .unwrap();
    let source = MockSource::new().with_tile(1, 1, 1, MockResponse::ok(create_test_png(8, 8)));
    let service = TileService::new(
        raster,
        FetchEngine::new(source.clone()),
        SourceConfig::new(SOURCE),
    );
    let app = router(service);

    let response = get(app.clone(), "/tile/0/1/1", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.requests(), vec![format!("{SOURCE}/1/1/1")]);

    // Only one level is visible
    let response = get(app, "/tile/1/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_type(response).await, "invalid_level");
}

#[tokio::test]
async fn test_mosaic_address() {
    let raster = RasterConfig::new(RasterSize {
        x: 512,
        y: 512,
        z: 3,
        c: 3,
    })
    .build()
    .unwrap();
    let url = format!("{SOURCE}/2/0/0/0.png");
    let source = MockSource::new().with_url(url.clone(), MockResponse::ok(create_test_png(8, 8)));
    let service = TileService::new(
        raster,
        FetchEngine::new(source.clone()),
        SourceConfig::new(SOURCE).with_suffix(".png"),
    );
    let app = router(service);

    let response = get(app.clone(), "/tile/2/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.requests(), vec![url]);

    let response = get(app.clone(), "/tile/3/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_type(response).await, "invalid_mosaic");

    // Mosaic segment is required for a multi-slice raster
    let response = get(app, "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_type(response).await, "invalid_address");
}

// =============================================================================
// ETags and Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_upstream_etag_is_reencoded() {
    let source = MockSource::new().with_tile(
        0,
        0,
        0,
        MockResponse::ok(create_test_png(8, 8)).with_etag("\"0000000000abc\""),
    );

    let response = get(router(test_service(source)), "/tile/0/0/0", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let expected = Fingerprint::decode("0000000000abc").quoted();
    assert_eq!(response.headers().get(header::ETAG).unwrap(), expected.as_str());
}

#[tokio::test]
async fn test_if_none_match_returns_not_modified() {
    let jpeg = create_test_jpeg(64, 64, 80);
    let etag = Fingerprint::from_payload(&jpeg).unwrap().quoted();
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(jpeg));
    let app = router(test_service(source));

    let response = get(app.clone(), "/tile/0/0/0", &[]).await;
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());

    let response = get(app.clone(), "/tile/0/0/0", &[(header::IF_NONE_MATCH, etag.as_str())]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());
    assert!(body_bytes(response).await.is_empty());

    let response = get(
        app,
        "/tile/0/0/0",
        &[(header::IF_NONE_MATCH, "\"0000000000000\"")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Empty Tiles
// =============================================================================

#[tokio::test]
async fn test_missing_tile_serves_empty_tile() {
    let empty = create_test_png(4, 4);
    let service = test_service(MockSource::new()).with_empty_tile(empty.clone().into());
    let app = router(service);

    let response = get(app.clone(), "/tile/1/0/1", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let etag = Fingerprint::for_missing_tile(42).quoted();
    assert_eq!(response.headers().get(header::ETAG).unwrap(), etag.as_str());
    assert_eq!(&body_bytes(response).await[..], &empty[..]);

    let response = get(app, "/tile/1/0/1", &[(header::IF_NONE_MATCH, etag.as_str())]).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_empty_upstream_payload_serves_empty_tile() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(Vec::new()));
    let service = test_service(source).with_empty_tile(Bytes::from_static(b"empty"));

    let response = get(router(service), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"empty");
}

#[tokio::test]
async fn test_missing_tile_without_empty_tile() {
    let response = get(router(test_service(MockSource::new())), "/tile/0/0/0", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_type(response).await, "not_found");
}

// =============================================================================
// Gzip
// =============================================================================

#[tokio::test]
async fn test_gzip_inflated_by_default() {
    let png = create_test_png(32, 32);
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(gzip(&png)));

    let response = get(
        router(test_service(source)),
        "/tile/0/0/0",
        &[(header::ACCEPT_ENCODING, "gzip")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    // Inflated upstream, one representation only
    assert!(response.headers().get(header::VARY).is_none());
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(&body_bytes(response).await[..], &png[..]);
}

#[tokio::test]
async fn test_gzip_passed_through() {
    let png = create_test_png(32, 32);
    let packed = gzip(&png);
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(packed.clone()));
    let service = TileService::new(
        test_raster(),
        FetchEngine::new(source),
        SourceConfig::new(SOURCE).with_decompress(false),
    );
    let app = router(service);

    let response = get(
        app.clone(),
        "/tile/0/0/0",
        &[(header::ACCEPT_ENCODING, "gzip, deflate")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    assert_eq!(response.headers().get(header::VARY).unwrap(), "accept-encoding");
    let etag = response.headers().get(header::ETAG).unwrap().clone();
    assert_eq!(&body_bytes(response).await[..], &packed[..]);

    // Clients that can't take gzip get the inflated tile
    let response = get(app.clone(), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(response.headers().get(header::VARY).unwrap(), "accept-encoding");
    assert_eq!(response.headers().get(header::ETAG).unwrap(), &etag);
    assert_eq!(&body_bytes(response).await[..], &png[..]);

    let response = get(
        app,
        "/tile/0/0/0",
        &[(header::IF_NONE_MATCH, etag.to_str().unwrap())],
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::VARY).unwrap(), "accept-encoding");
}

#[tokio::test]
async fn test_corrupt_gzip_is_bad_gateway() {
    let mut packed = gzip(&create_test_png(32, 32));
    let half = packed.len() / 2;
    packed.truncate(half);
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::ok(packed));

    let response = get(router(test_service(source)), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_type(response).await, "decompression_error");
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_invalid_addresses() {
    let app = router(test_service(MockSource::new()));

    for (uri, expected) in [
        ("/tile/a/0/0", "invalid_address"),
        ("/tile/0/0", "invalid_address"),
        ("/tile/2/0/0", "invalid_level"),
        ("/tile/-1/0/0", "invalid_level"),
        ("/tile/1/2/0", "tile_out_of_bounds"),
        ("/tile/0/0/1", "tile_out_of_bounds"),
    ] {
        let response = get(app.clone(), uri, &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_type(response).await, expected, "{uri}");
    }
}

#[tokio::test]
async fn test_invalid_addresses_never_reach_upstream() {
    let source = MockSource::new();
    let app = router(test_service(source.clone()));

    get(app.clone(), "/tile/9/0/0", &[]).await;
    get(app, "/tile/x/y/z", &[]).await;
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_upstream_server_error() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::status(500));

    let response = get(router(test_service(source)), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "remote_error");
    assert_eq!(error["status"], 502);
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let service = TileService::new(
        test_raster(),
        FetchEngine::new(MockSource::new()),
        SourceConfig::new("http://unreachable.test/layer"),
    );

    let response = get(router(service), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_type(response).await, "connection_error");
}

#[tokio::test]
async fn test_partial_responses_retried() {
    let url = format!("{SOURCE}/0/0/0");
    let png = create_test_png(8, 8);
    let source = MockSource::new().with_script(
        url,
        vec![
            MockResponse::status(206),
            MockResponse::status(206),
            MockResponse::ok(png.clone()),
        ],
    );

    let response = get(router(test_service(source.clone())), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.request_count(), 3);
    assert_eq!(&body_bytes(response).await[..], &png[..]);
}

#[tokio::test]
async fn test_partial_responses_exhaust_retries() {
    let source = MockSource::new().with_tile(0, 0, 0, MockResponse::status(206));
    let service = TileService::new(
        test_raster(),
        FetchEngine::new(source.clone()),
        SourceConfig::new(SOURCE).with_max_retries(2),
    );

    let response = get(router(service), "/tile/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_type(response).await, "retries_exhausted");
    assert_eq!(source.request_count(), 2);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let response = get(router(test_service(MockSource::new())), "/health", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_route() {
    let response = get(router(test_service(MockSource::new())), "/tiles/0/0/0", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
