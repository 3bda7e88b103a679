//! End-to-end tests for the fetch pipeline
//!
//! These tests use wiremock to create mock HTTP servers and tempfile for the
//! store root.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_mirror::config::FetcherConfig;
use sumi_mirror::fetcher::ResponseSummary;
use sumi_mirror::storage::{AssetLocator, FileStore};
use sumi_mirror::{EmbeddedAsset, ErrorKind, FetchState, Fetcher, Metadata, MirrorMode};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a completion callback saw, kept after the result itself is gone
#[derive(Debug, Clone)]
struct Outcome {
    url: String,
    state: FetchState,
    metadata: Option<Metadata>,
    response: Option<ResponseSummary>,
    assets: usize,
    error: Option<(ErrorKind, String)>,
}

fn test_config() -> FetcherConfig {
    FetcherConfig {
        asynchronous: true,
        mirror: false,
        mirror_mode: MirrorMode::Filtered,
        max_concurrent_requests: 4,
        request_timeout_secs: 5,
        user_agent: "TestMirror/1.0".to_string(),
    }
}

fn mirror_config() -> FetcherConfig {
    FetcherConfig {
        mirror: true,
        ..test_config()
    }
}

/// Creates a fetcher whose callback records every outcome
fn recording_fetcher(config: &FetcherConfig, root: &Path) -> (Fetcher, Arc<Mutex<Vec<Outcome>>>) {
    let mut fetcher = Fetcher::new(config, root).expect("Failed to build fetcher");
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);

    fetcher.on_complete(move |result| {
        sink.lock().unwrap().push(Outcome {
            url: result.url.clone(),
            state: result.state,
            metadata: result.metadata.clone(),
            response: result.response.clone(),
            assets: result.assets,
            error: result.error.as_ref().map(|e| (e.kind(), e.to_string())),
        });
    });

    (fetcher, outcomes)
}

/// Submits every URL, waits, and returns the recorded outcomes
async fn mirror_all(config: &FetcherConfig, root: &Path, urls: &[String]) -> Vec<Outcome> {
    let (mut fetcher, outcomes) = recording_fetcher(config, root);
    for url in urls {
        let _ = fetcher.submit(url).await;
    }
    fetcher.await_all().await;

    let outcomes = outcomes.lock().unwrap().clone();
    outcomes
}

async fn mirror_one(config: &FetcherConfig, root: &Path, url: &str) -> Outcome {
    let mut outcomes = mirror_all(config, root, &[url.to_string()]).await;
    assert_eq!(outcomes.len(), 1, "expected exactly one callback");
    outcomes.remove(0)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn store_for(root: &Path, url: &str) -> FileStore {
    FileStore::new(root, &Url::parse(url).unwrap())
}

fn files_in(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

const ARTICLE: &str = r##"<html><head>
<link rel="stylesheet" href="/css/site.css">
<script src="https://cdn.example.org/lib.js"></script>
</head><body>
<a href="/a">a</a><a href="/b">b</a><a href="https://other.example.org/">c</a><a href="#top">d</a>
<img src="/img/logo.png"><img src="../img/logo.png">
</body></html>"##;

#[tokio::test]
async fn test_mirror_page_with_assets() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/blog/post", server.uri());

    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html(ARTICLE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
        .expect(1)
        .mount(&server)
        .await;
    // Referenced twice, downloaded once
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mirror_one(&mirror_config(), dir.path(), &page_url).await;
    assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.state, FetchState::Succeeded);
    assert_eq!(outcome.assets, 2);

    let metadata = outcome.metadata.unwrap();
    assert_eq!(metadata.num_links, 4);
    assert_eq!(metadata.num_images, 2);
    assert!(metadata.last_fetched_at.is_none());

    let response = outcome.response.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body_len, ARTICLE.len());
    assert!(response.content_type.starts_with("text/html"));

    // Persisted metadata matches what the callback saw
    let store = store_for(dir.path(), &page_url);
    let persisted = store.load_metadata().await.unwrap().unwrap();
    assert_eq!(persisted, metadata);

    // Same-origin assets are on disk and referenced locally
    let saved = std::fs::read_to_string(store.document_path()).unwrap();
    for asset_path in ["/css/site.css", "/img/logo.png"] {
        let asset = EmbeddedAsset::new(Url::parse(&format!("{}{}", server.uri(), asset_path)).unwrap());
        assert!(store.asset_file_path(&asset).is_file(), "{} not saved", asset_path);
        assert!(saved.contains(&store.local_reference(&asset)));
    }
    let logo = EmbeddedAsset::new(Url::parse(&format!("{}/img/logo.png", server.uri())).unwrap());
    assert_eq!(
        std::fs::read(store.asset_file_path(&logo)).unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );

    // Foreign assets and anchors are untouched
    assert!(saved.contains("https://cdn.example.org/lib.js"));
    assert!(saved.contains(r#"href="/a""#));
}

#[tokio::test]
async fn test_without_mirroring_no_assets_requested() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/blog/post", server.uri());

    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = mirror_one(&test_config(), dir.path(), &page_url).await;
    assert_eq!(outcome.state, FetchState::Succeeded);
    assert_eq!(outcome.assets, 0);

    let store = store_for(dir.path(), &page_url);
    let saved = std::fs::read_to_string(store.document_path()).unwrap();
    assert!(saved.contains(r#"src="/img/logo.png""#));
    assert!(!store.asset_dir().exists());
}

#[tokio::test]
async fn test_bad_status_writes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<p>gone</p>", "text/html"))
        .mount(&server)
        .await;

    let outcome = mirror_one(&test_config(), dir.path(), &format!("{}/missing", server.uri())).await;

    let (kind, message) = outcome.error.unwrap();
    assert_eq!(kind, ErrorKind::BadStatus);
    assert!(message.contains("404"), "{}", message);
    assert_eq!(outcome.state, FetchState::Failed);
    assert!(outcome.metadata.is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_non_html_content_type_rejected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json"))
        .mount(&server)
        .await;

    let outcome = mirror_one(&test_config(), dir.path(), &format!("{}/api", server.uri())).await;

    let (kind, message) = outcome.error.unwrap();
    assert_eq!(kind, ErrorKind::UnsupportedContentType);
    assert!(message.contains("application/json"), "{}", message);
    assert!(outcome.response.is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_content_type_match_is_case_insensitive() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/upper"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<a href=x>x</a>", "TEXT/HTML"))
        .mount(&server)
        .await;

    let outcome = mirror_one(&test_config(), dir.path(), &format!("{}/upper", server.uri())).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.metadata.unwrap().num_links, 1);
}

#[tokio::test]
async fn test_redirect_names_document_after_final_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let old_url = format!("{}/old", server.uri());
    let new_url = format!("{}/new/", server.uri());

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(html(r#"<img src="pic.png">"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/pic.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("png", "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mirror_one(&mirror_config(), dir.path(), &old_url).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.url, old_url);
    assert_eq!(outcome.response.unwrap().final_url.as_str(), new_url);

    // Stored under the final URL, asset resolved against it
    assert!(store_for(dir.path(), &new_url).document_path().is_file());
    assert!(!store_for(dir.path(), &old_url).document_path().exists());
}

#[tokio::test]
async fn test_refetch_carries_previous_fetch_time() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<a href=/x>x</a><img src=/i.png>"))
        .expect(2)
        .mount(&server)
        .await;

    let first = mirror_one(&test_config(), dir.path(), &page_url)
        .await
        .metadata
        .unwrap();
    assert!(first.last_fetched_at.is_none());

    let second = mirror_one(&test_config(), dir.path(), &page_url)
        .await
        .metadata
        .unwrap();
    assert_eq!(second.last_fetched_at, Some(first.fetched_at));
    assert!(second.fetched_at > first.fetched_at);

    let persisted = store_for(dir.path(), &page_url)
        .load_metadata()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted, second);
}

#[tokio::test]
async fn test_asset_failure_fails_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/page", server.uri());

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(r#"<script src="/app.js"></script>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = mirror_one(&mirror_config(), dir.path(), &page_url).await;

    let (kind, message) = outcome.error.unwrap();
    assert_eq!(kind, ErrorKind::BadStatus);
    assert!(message.starts_with("failed to download asset"), "{}", message);
    assert_eq!(outcome.state, FetchState::Failed);
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_blind_mode_absolutizes_without_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/docs/index.html", server.uri());

    Mock::given(method("GET"))
        .and(path("/docs/index.html"))
        .respond_with(html(r#"<a href="next.html">n</a><img src="/logo.png">"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = FetcherConfig {
        mirror_mode: MirrorMode::Blind,
        ..mirror_config()
    };
    let outcome = mirror_one(&config, dir.path(), &page_url).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(outcome.assets, 0);

    let saved = std::fs::read_to_string(store_for(dir.path(), &page_url).document_path()).unwrap();
    assert!(saved.contains(&format!(r#"href="{}/docs/next.html""#, server.uri())));
    assert!(saved.contains(&format!(r#"src="{}/logo.png""#, server.uri())));
}

#[tokio::test]
async fn test_duplicate_urls_fetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(html("<p>once</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/once", server.uri());
    let outcomes = mirror_all(
        &test_config(),
        dir.path(),
        &[url.clone(), url.clone(), format!("{}#section", url)],
    )
    .await;

    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn test_every_url_reaches_a_callback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html("<p>ok</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let outcomes = mirror_all(
        &test_config(),
        dir.path(),
        &[
            format!("{}/ok", server.uri()),
            format!("{}/gone", server.uri()),
        ],
    )
    .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|o| o.error.is_none()).count(), 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o.state, FetchState::Succeeded | FetchState::Failed)));
}

#[tokio::test]
async fn test_concurrency_cap_across_pages_and_assets() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/asset.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("x", "text/css")
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            html(r#"<link rel="stylesheet" href="/asset.css">"#).set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let config = FetcherConfig {
        max_concurrent_requests: 2,
        ..mirror_config()
    };
    let (mut fetcher, outcomes) = recording_fetcher(&config, dir.path());
    for i in 0..6 {
        fetcher
            .submit(&format!("{}/page{}", server.uri(), i))
            .await
            .unwrap();
    }
    fetcher.await_all().await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(|o| o.error.is_none()), "{:?}", outcomes);

    let stats = fetcher.client().stats();
    assert_eq!(stats.total(), 12);
    assert!(stats.peak() <= 2, "peak was {}", stats.peak());
    assert_eq!(stats.in_flight(), 0);
}

#[tokio::test]
async fn test_cancelled_fetcher_sends_no_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(html("<p>never</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let (mut fetcher, outcomes) = recording_fetcher(&test_config(), dir.path());
    fetcher.cancellation_token().cancel();

    fetcher.submit(&format!("{}/a", server.uri())).await.unwrap();
    fetcher.submit(&format!("{}/b", server.uri())).await.unwrap();
    fetcher.await_all().await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes.iter() {
        let (kind, message) = outcome.error.clone().unwrap();
        assert_eq!(kind, ErrorKind::Transport);
        assert!(message.contains("cancelled"), "{}", message);
    }
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_sync_mode_returns_pipeline_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html("<p>ok</p>"))
        .mount(&server)
        .await;

    let config = FetcherConfig {
        asynchronous: false,
        ..test_config()
    };
    let (mut fetcher, outcomes) = recording_fetcher(&config, dir.path());

    let err = fetcher
        .submit(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadStatus);

    // Inline execution: the callback has already fired when submit returns
    assert_eq!(outcomes.lock().unwrap().len(), 1);

    assert!(fetcher.submit(&format!("{}/ok", server.uri())).await.unwrap());
    assert_eq!(outcomes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_document_name_collision_detected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/x/y"))
        .respond_with(html("<p>first</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x_y"))
        .respond_with(html("<p>second</p>"))
        .mount(&server)
        .await;

    let config = FetcherConfig {
        asynchronous: false,
        ..test_config()
    };
    let first = format!("{}/x/y", server.uri());
    let second = format!("{}/x_y", server.uri());
    let outcomes = mirror_all(&config, dir.path(), &[first.clone(), second]).await;

    assert!(outcomes[0].error.is_none());
    let (kind, message) = outcomes[1].error.clone().unwrap();
    assert_eq!(kind, ErrorKind::Storage);
    assert!(message.contains("already used"), "{}", message);

    // The first page's files are left alone
    let saved = std::fs::read_to_string(store_for(dir.path(), &first).document_path()).unwrap();
    assert!(saved.contains("first"));
}

#[tokio::test]
async fn test_awkward_asset_urls_all_saved() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/page", server.uri());
    let cache_buster = "a".repeat(300);

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(&format!(
            r#"<img src="/img"><img src="/img/x.png"><img src="/photo.png?v={}">"#,
            cache_buster
        )))
        .mount(&server)
        .await;
    for (asset_path, body) in [("/img", "bare"), ("/img/x.png", "nested"), ("/photo.png", "long")] {
        Mock::given(method("GET"))
            .and(path(asset_path))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "image/png"))
            .expect(1)
            .mount(&server)
            .await;
    }

    let outcome = mirror_one(&mirror_config(), dir.path(), &page_url).await;
    assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.assets, 3);

    let store = store_for(dir.path(), &page_url);
    let saved = std::fs::read_to_string(store.document_path()).unwrap();
    for (asset_url, body) in [
        (format!("{}/img", server.uri()), "bare"),
        (format!("{}/img/x.png", server.uri()), "nested"),
        (format!("{}/photo.png?v={}", server.uri(), cache_buster), "long"),
    ] {
        let asset = EmbeddedAsset::new(Url::parse(&asset_url).unwrap());
        let file = store.asset_file_path(&asset);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), body);
        assert!(file.file_name().unwrap().len() < 255);
        assert!(saved.contains(&store.local_reference(&asset)));
    }
}

#[tokio::test]
async fn test_failed_persist_discards_new_assets() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/page", server.uri());

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(r#"<img src="/img/x.png"><link rel="stylesheet" href="/site.css">"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/x.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("png", "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
        .mount(&server)
        .await;

    // A directory where the document should go makes the document write fail
    let store = store_for(dir.path(), &page_url);
    std::fs::create_dir_all(store.document_path()).unwrap();

    let outcome = mirror_one(&mirror_config(), dir.path(), &page_url).await;
    let (kind, message) = outcome.error.unwrap();
    assert_eq!(kind, ErrorKind::Storage);
    assert!(message.starts_with("failed to save document"), "{}", message);
    assert_eq!(outcome.state, FetchState::Failed);
    assert_eq!(outcome.assets, 0);

    assert!(!store.asset_dir().exists());
    assert!(!store.metadata_path().exists());
}

#[tokio::test]
async fn test_unusable_prior_fetch_time_fails_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page_url = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>late</p>"))
        .mount(&server)
        .await;

    let store = store_for(dir.path(), &page_url);
    let prior = Metadata {
        num_links: 0,
        num_images: 0,
        last_fetched_at: None,
        fetched_at: chrono::DateTime::<chrono::Utc>::MAX_UTC,
    };
    store.save_metadata(&prior).await.unwrap();

    let outcome = mirror_one(&test_config(), dir.path(), &page_url).await;
    let (kind, message) = outcome.error.unwrap();
    assert_eq!(kind, ErrorKind::Serialization);
    assert!(message.starts_with("failed to merge prior metadata"), "{}", message);
    assert!(!store.document_path().exists());
    assert_eq!(store.load_metadata().await.unwrap(), Some(prior));
}
