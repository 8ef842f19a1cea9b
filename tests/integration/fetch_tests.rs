//! Fetcher behavior against a live mock server

use crate::{idle_limiter, test_config};
use snapshot_archiver::fetcher::{FetchFailure, Fetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: &[u8], content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), content_type))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_page_once() {
    let server = MockServer::start().await;
    serve(&server, "/", b"<html><body>hi</body></html>", "text/html").await;

    let config = test_config();
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");
    let url = format!("{}/", server.uri());

    let page = fetcher.fetch_page(&url).await.expect("first fetch succeeds");
    assert_eq!(page.body, b"<html><body>hi</body></html>");
    assert!(page.content_type.unwrap().starts_with("text/html"));

    // Second fetch of the same URL is declined
    assert!(fetcher.fetch_page(&url).await.is_none());

    fetcher.clear_cache();
    assert!(fetcher.fetch_page(&url).await.is_some());
}

#[tokio::test]
async fn test_declared_size_over_limit() {
    let server = MockServer::start().await;
    serve(&server, "/big.txt", &[b'a'; 100], "text/plain").await;

    let mut config = test_config();
    config.limits.max_file_size = 10;
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");

    let result = fetcher
        .fetch_resource(&format!("{}/big.txt", server.uri()))
        .await;
    assert!(!result.is_success());
    assert!(matches!(
        result.failure(),
        Some(FetchFailure::SizeExceeded { limit: 10, .. })
    ));
}

#[tokio::test]
async fn test_disallowed_content_type() {
    let server = MockServer::start().await;
    serve(&server, "/blob", &[1, 2, 3], "application/octet-stream").await;

    let config = test_config();
    let limiter = idle_limiter(&config);
    let fetcher = Fetcher::new(&config, limiter.clone()).expect("client");

    let result = fetcher
        .fetch_resource(&format!("{}/blob", server.uri()))
        .await;
    let failure = result.failure().expect("rejected");
    assert_eq!(failure.as_str(), "invalid-content-type");
    assert!(failure.is_declined());
    assert_eq!(limiter.active_connections(), 0);
}

#[tokio::test]
async fn test_duplicate_resource_and_fetch_text() {
    let server = MockServer::start().await;
    serve(&server, "/app.js", b"let x = 1;", "application/javascript").await;

    let config = test_config();
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");
    let url = format!("{}/app.js", server.uri());

    assert_eq!(fetcher.fetch_text(&url).await.as_deref(), Ok("let x = 1;"));

    let again = fetcher.fetch_resource(&url).await;
    assert_eq!(again.failure(), Some(&FetchFailure::DuplicateUrl));
}

#[tokio::test]
async fn test_http_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config();
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");

    let result = fetcher
        .fetch_resource(&format!("{}/missing.png", server.uri()))
        .await;
    let failure = result.failure().expect("failed");
    assert!(matches!(failure, FetchFailure::Transport(_)));
    assert!(!failure.is_declined());
}

#[tokio::test]
async fn test_bandwidth_window_exhausted() {
    let server = MockServer::start().await;
    serve(&server, "/a.css", &[b'x'; 60], "text/css").await;
    serve(&server, "/b.css", &[b'y'; 60], "text/css").await;

    let mut config = test_config();
    config.limits.max_bandwidth_bytes_per_sec = 100;
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");

    let first = fetcher.fetch_resource(&format!("{}/a.css", server.uri())).await;
    assert!(first.is_success());
    let second = fetcher.fetch_resource(&format!("{}/b.css", server.uri())).await;
    assert_eq!(second.failure(), Some(&FetchFailure::BandwidthLimit));
}

#[tokio::test]
async fn test_fetch_text_honors_declared_charset() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/latin.css",
        b"a::after { content: \"caf\xe9\"; }",
        "text/css; charset=windows-1252",
    )
    .await;

    let config = test_config();
    let fetcher = Fetcher::new(&config, idle_limiter(&config)).expect("client");

    let text = fetcher
        .fetch_text(&format!("{}/latin.css", server.uri()))
        .await
        .unwrap();
    assert_eq!(text, "a::after { content: \"café\"; }");
}
