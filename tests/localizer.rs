//! Asset localization tests with an in-memory fetcher.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use lureforge::adapters::Fetcher;
use lureforge::core::AssetLocalizer;
use lureforge::library::{ContentDir, ContentId};
use tempfile::TempDir;

const ORIGIN: &str = "https://legacy.example.com";
const BASE: &str = "https://cdn.example.org/content/abc";

/// Serves canned bodies and records every requested URL
#[derive(Default)]
struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", url))
    }
}

async fn content_dir(temp: &TempDir) -> ContentDir {
    let content = ContentDir::new(temp.path(), ContentId::from_bytes(b"localizer"));
    content.ensure().await.unwrap();
    content
}

#[tokio::test]
async fn test_references_are_downloaded_and_rewritten() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    let fetcher = MockFetcher::default()
        .with("https://legacy.example.com/system/images/logo.png", "PNG")
        .with("https://static.example.net/lib/app.js", "JS");

    let html = r#"<img src="/system/images/logo.png"><script src="//static.example.net/lib/app.js"></script><a href="/about">About</a>"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert_eq!(
        localized.html,
        r#"<img src="https://cdn.example.org/content/abc/system/images/logo.png"><script src="https://cdn.example.org/content/abc/cdn/static.example.net/lib/app.js"></script><a href="/about">About</a>"#
    );
    assert_eq!(std::fs::read_to_string(content.join("system/images/logo.png")).unwrap(), "PNG");
    assert_eq!(
        std::fs::read_to_string(content.join("cdn/static.example.net/lib/app.js")).unwrap(),
        "JS"
    );
    assert_eq!(localized.downloaded.len(), 2);
    assert!(localized.failed.is_empty());
}

#[tokio::test]
async fn test_existing_asset_is_not_fetched_again() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    std::fs::create_dir_all(content.join("images")).unwrap();
    std::fs::write(content.join("images/bg.jpg"), "cached").unwrap();

    let fetcher = MockFetcher::default();
    let html = r#"<div style="background:url('/images/bg.jpg')"></div>"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert!(fetcher.requested().is_empty());
    assert!(localized.downloaded.is_empty());
    assert_eq!(
        localized.html,
        r#"<div style="background:url('https://cdn.example.org/content/abc/images/bg.jpg')"></div>"#
    );
}

#[tokio::test]
async fn test_failed_download_leaves_reference() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    let fetcher = MockFetcher::default();

    let html = r#"<img src="/images/missing.gif">"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert_eq!(localized.html, html);
    assert_eq!(localized.failed, vec!["/images/missing.gif"]);
    assert!(!content.join("images/missing.gif").exists());
}

#[tokio::test]
async fn test_unsafe_path_is_rejected_without_fetch() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    let fetcher = MockFetcher::default();

    let html = r#"<img src="/system/../../secret.png">"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert_eq!(localized.html, html);
    assert_eq!(localized.rejected, vec!["/system/../../secret.png"]);
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn test_stylesheet_references_are_followed() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    let fetcher = MockFetcher::default()
        .with(
            "https://legacy.example.com/system/site.css",
            "@import url(/system/theme.css); body { background: url(/images/bg.png); }",
        )
        .with(
            "https://legacy.example.com/system/theme.css",
            "h1 { background: url(\"/images/h1.png\"); }",
        )
        .with("https://legacy.example.com/images/bg.png", "BG")
        .with("https://legacy.example.com/images/h1.png", "H1");

    let html = r#"<link rel="stylesheet" href="/system/site.css">"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert_eq!(
        localized.html,
        r#"<link rel="stylesheet" href="https://cdn.example.org/content/abc/system/site.css">"#
    );
    assert!(content.join("images/bg.png").exists());
    assert!(content.join("images/h1.png").exists());

    let site = std::fs::read_to_string(content.join("system/site.css")).unwrap();
    assert_eq!(
        site,
        "@import url(https://cdn.example.org/content/abc/system/theme.css); body { background: url(https://cdn.example.org/content/abc/images/bg.png); }"
    );

    let theme = std::fs::read_to_string(content.join("system/theme.css")).unwrap();
    assert_eq!(theme, "h1 { background: url(\"https://cdn.example.org/content/abc/images/h1.png\"); }");
}

#[tokio::test]
async fn test_stylesheet_cycle_terminates() {
    let temp = TempDir::new().unwrap();
    let content = content_dir(&temp).await;
    let fetcher = MockFetcher::default()
        .with("https://legacy.example.com/system/a.css", "@import url(/system/b.css);")
        .with("https://legacy.example.com/system/b.css", "@import url(/system/a.css);");

    let html = r#"<link href="/system/a.css" rel="stylesheet">"#;
    let localized = AssetLocalizer::new(&fetcher, &content, ORIGIN, BASE)
        .localize(html)
        .await
        .unwrap();

    assert_eq!(localized.downloaded, vec!["system/a.css", "system/b.css"]);
    assert_eq!(fetcher.requested().len(), 2);
}
