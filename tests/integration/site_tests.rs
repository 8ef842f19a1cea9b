//! Site-mode runs end to end

use crate::{idle_archiver, test_config};
use snapshot_archiver::SnapshotError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><head><title>Demo</title>
<link rel="stylesheet" href="/assets/site.css">
<style>h1{color:blue}</style>
<script src="/assets/app.js"></script>
</head><body>
<h1>Hello</h1>
<img src="a.png">
<img src="/p/a.png">
<img src="/gone.png">
</body></html>"#;

async fn mount_site(server: &MockServer) {
    let routes: [(&str, Vec<u8>, &str); 4] = [
        ("/p/", PAGE.as_bytes().to_vec(), "text/html; charset=utf-8"),
        ("/p/a.png", vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0], "image/png"),
        (
            "/assets/site.css",
            b"body{margin:0}\np::before{content:\"caf\xe9\"}".to_vec(),
            "text/css; charset=windows-1252",
        ),
        ("/assets/app.js", b"function go(){return 1}".to_vec(), "application/javascript"),
    ];
    for (route, body, content_type) in routes {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_archive_site_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let out = TempDir::new().unwrap();

    let outcome = idle_archiver(test_config())
        .archive_site(&format!("{}/p/", server.uri()), out.path())
        .await
        .unwrap();

    assert_eq!(outcome.path.file_name().unwrap(), "site_data.yaml");
    let site_dir = outcome.path.parent().unwrap();
    assert!(site_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("site_"));
    for dir in ["images", "videos", "styles", "scripts"] {
        assert!(site_dir.join(dir).is_dir());
    }
    assert!(site_dir.join("images/a.png").is_file());

    // Two images after dedup, one stylesheet, one script, one inline style
    let stats = outcome.statistics;
    assert_eq!(stats.expected_files, 5);
    assert_eq!(stats.processed_files, 4);
    assert_eq!(stats.error_files, 1);

    let text = std::fs::read_to_string(&outcome.path).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    let site = &doc["site"];

    let images = site["images"].as_sequence().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["path"], format!("{}/p/a.png", server.uri()).as_str());
    assert_eq!(images[0]["local_path"], "./images/a.png");
    assert_eq!(images[0]["content_type"], "image/png");
    assert_eq!(images[0]["size"], 8);

    let css = site["css"].as_sequence().unwrap();
    assert_eq!(css.len(), 2);
    let external = css
        .iter()
        .find(|c| c["path"].as_str().unwrap().ends_with("/assets/site.css"))
        .unwrap();
    assert!(external["content"].as_str().unwrap().contains("café"));
    assert_eq!(site["javascript"].as_sequence().unwrap().len(), 1);
    assert!(site["html"]["main"].as_str().unwrap().contains("Hello"));
    assert_eq!(site["metadata"]["url"], format!("{}/p/", server.uri()).as_str());
    assert_eq!(site["metadata"]["statistics"]["processed_files"], 4);
}

#[tokio::test]
async fn test_unreachable_page_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let out = TempDir::new().unwrap();

    let err = idle_archiver(test_config())
        .archive_site(&format!("{}/", server.uri()), out.path())
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::PageUnavailable(_)));
}

#[tokio::test]
async fn test_disallowed_scheme_is_rejected() {
    let out = TempDir::new().unwrap();
    let err = idle_archiver(test_config())
        .archive_site("ftp://example.com/", out.path())
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::UrlError(_)));
}
