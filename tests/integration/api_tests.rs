//! API integration tests for image delivery and error handling.
//!
//! Tests verify the three delivery routes, their response headers, the
//! conditional-cache short-circuit, and the error taxonomy.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{is_valid_jpeg, test_router, write_jpeg, write_png};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Serve Original
// =============================================================================

#[tokio::test]
async fn test_original_served_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let stored = std::fs::read(dir.path().join("photo.png")).unwrap();

    let router = test_router(dir.path(), 0, false);
    let response = router.oneshot(get("/o/photo.png")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["content-optimized"], "false");
    assert_eq!(
        response.headers()["cache-control"],
        "public, max-age=86400, stale-while-revalidate=7200"
    );

    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &stored[..]);
}

#[tokio::test]
async fn test_original_conditional_304() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let first = router
        .clone()
        .oneshot(get("/o/photo.png"))
        .await
        .unwrap();
    let etag = first.headers()["etag"].to_str().unwrap().to_string();

    let second = router
        .oneshot(get_with("/o/photo.png", "if-none-match", &etag))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(second.headers()["etag"].to_str().unwrap(), etag);

    let body = second.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_conditional_matches_among_token_list() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let first = router.clone().oneshot(get("/o/photo.png")).await.unwrap();
    let etag = first.headers()["etag"].to_str().unwrap().trim_matches('"').to_string();

    let header_value = format!("\"stale\", \"{etag}\" , \"other\"");
    let second = router
        .oneshot(get_with("/o/photo.png", "if-none-match", &header_value))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_missing_asset_404_without_body() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router.oneshot(get("/o/absent.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_traversal_rejected_as_404() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get("/o/subdir/../../photo.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Auto-Optimize
// =============================================================================

#[tokio::test]
async fn test_auto_without_accept_serves_original_png() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let stored = std::fs::read(dir.path().join("photo.png")).unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router.oneshot(get("/a/photo.png")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-optimized"], "false");
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["vary"], "Accept");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &stored[..]);
}

#[tokio::test]
async fn test_auto_negotiates_webp() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get_with("/a/photo.png", "accept", "image/webp,*/*;q=0.8"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/webp");
    assert_eq!(response.headers()["content-optimized"], "true");
    assert_eq!(response.headers()["source-type"], "image/png");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[0..4], b"RIFF");
    assert_eq!(&body[8..12], b"WEBP");
}

#[tokio::test]
async fn test_auto_prefers_avif_over_webp() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg(dir.path(), "photo.jpg", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get_with("/a/photo.jpg", "accept", "image/avif,image/webp"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/avif");
    assert_eq!(response.headers()["source-type"], "image/jpeg");
}

#[tokio::test]
async fn test_auto_same_format_serves_original() {
    // A WEBP-supporting client asking for a WEBP source gets the original.
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "tmp.png", 8, 8);
    let png = image::open(dir.path().join("tmp.png")).unwrap();
    png.save_with_format(dir.path().join("photo.webp"), image::ImageFormat::WebP)
        .unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get_with("/a/photo.webp", "accept", "image/webp"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-optimized"], "false");
    assert_eq!(response.headers()["content-type"], "image/webp");
}

#[tokio::test]
async fn test_auto_svg_is_never_transcoded() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("logo.svg"),
        "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>",
    )
    .unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get_with("/a/logo.svg", "accept", "image/avif,image/webp"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-optimized"], "false");
    assert_eq!(response.headers()["content-type"], "image/svg+xml");
}

// =============================================================================
// Preset-Optimize
// =============================================================================

#[tokio::test]
async fn test_preset_transcode_bounded_by_profile() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 64, 32);
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get("/p/photo.png?preset=thumb&format=jpeg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
    assert_eq!(response.headers()["content-optimized"], "true");
    assert_eq!(response.headers()["source-type"], "image/png");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_jpeg(&body));
    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!(decoded.width(), 16);
}

#[tokio::test]
async fn test_preset_empty_query_serves_original() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let response = router.oneshot(get("/p/photo.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-optimized"], "false");
}

#[tokio::test]
async fn test_preset_unknown_format_is_400() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get("/p/photo.png?preset=thumb&format=gif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unsupported_format");
}

#[tokio::test]
async fn test_preset_error_reasons_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);
    let router = test_router(dir.path(), 0, false);

    // Unknown preset name.
    let response = router
        .clone()
        .oneshot(get("/p/photo.png?preset=hero&format=jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let unknown: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(unknown["error"], "unknown_preset");

    // Known preset, format the preset does not define.
    let response = router
        .oneshot(get("/p/photo.png?preset=thumb&format=avif"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let missing: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(missing["error"], "format_not_available");
}

#[tokio::test]
async fn test_preset_corrupt_source_is_500() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.png"), b"\x89PNG\r\n\x1a\nnot a real png").unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router
        .oneshot(get("/p/broken.png?preset=thumb&format=jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "transcode_error");
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_exposition() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), 0, true);

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("active_jobs 0"));
    assert!(text.contains("# TYPE vips_mem gauge"));
    assert!(text.contains("vips_allocs"));
}

#[tokio::test]
async fn test_metrics_absent_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path(), 0, false);

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
