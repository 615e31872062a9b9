//! Admission-control tests: bounded concurrency at the HTTP boundary.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::{router_with_transcoder, write_png, SlowTranscoder};

fn preset_request() -> Request<Body> {
    Request::builder()
        .uri("/p/photo.png?preset=thumb&format=jpeg")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_requests_one_rejected_at_limit() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);

    let transcoder = Arc::new(SlowTranscoder::new(Duration::from_millis(500)));
    let router = router_with_transcoder(dir.path(), 1, false, Arc::clone(&transcoder));

    // First request occupies the single slot, second arrives while the
    // transcode is still sleeping.
    let first = tokio::spawn(router.clone().oneshot(preset_request()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = router.clone().oneshot(preset_request()).await.unwrap();

    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(second.headers()["retry-after"], "5");
    // Intermediaries must not cache the rejection.
    assert!(!second.headers().contains_key("cache-control"));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Only the admitted request reached the engine.
    assert_eq!(transcoder.calls(), 1);

    // The slot is free again once the job finished.
    let third = router.oneshot(preset_request()).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unlimited_admits_everything() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);

    let transcoder = Arc::new(SlowTranscoder::new(Duration::from_millis(50)));
    let router = router_with_transcoder(dir.path(), 0, false, Arc::clone(&transcoder));

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(router.clone().oneshot(preset_request())))
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(transcoder.calls(), 8);
}

#[tokio::test]
async fn test_conditional_hit_skips_admission() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 8, 8);

    let transcoder = Arc::new(SlowTranscoder::new(Duration::from_millis(10)));
    let router = router_with_transcoder(dir.path(), 1, false, Arc::clone(&transcoder));

    let first = router.clone().oneshot(preset_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers()["etag"].to_str().unwrap().to_string();

    let request = Request::builder()
        .uri("/p/photo.png?preset=thumb&format=jpeg")
        .header("if-none-match", &etag)
        .body(Body::empty())
        .unwrap();
    let second = router.oneshot(request).await.unwrap();

    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    // The 304 short-circuit never consulted the engine.
    assert_eq!(transcoder.calls(), 1);
}
