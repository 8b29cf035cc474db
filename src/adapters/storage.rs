//! Content file storage.
//!
//! `LocalStorage` writes under the library directory. With a public base URL
//! it hands out object-storage style URLs (`{base}/{content_id}/{path}`);
//! without one it hands out `file://` URLs into the library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use url::Url;

use super::Storage;
use crate::library::ContentId;

/// Filesystem storage rooted at the library directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    library_dir: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStorage {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            public_base_url: None,
        }
    }

    /// Serve stored files from `base` instead of the local filesystem
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.public_base_url = Some(base.trim_end_matches('/').to_string());
        self
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    fn local_path(&self, content_id: &ContentId, relative_path: &str) -> PathBuf {
        self.library_dir
            .join(content_id.as_str())
            .join(relative_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(&self, content_id: &ContentId, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.local_path(content_id, relative_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    fn url_for(&self, content_id: &ContentId, relative_path: &str) -> String {
        let relative_path = relative_path.trim_start_matches('/');

        if let Some(base) = &self.public_base_url {
            return if relative_path.is_empty() {
                format!("{}/{}", base, content_id)
            } else {
                format!("{}/{}/{}", base, content_id, relative_path)
            };
        }

        let path = self.local_path(content_id, relative_path);
        match Url::from_file_path(&path) {
            Ok(url) => url.to_string().trim_end_matches('/').to_string(),
            Err(()) => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id() -> ContentId {
        ContentId::parse("0123456789abcdef").unwrap()
    }

    #[tokio::test]
    async fn test_store_creates_directories() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());

        storage.store(&id(), "/system/css/site.css", b"body{}").await.unwrap();

        let written = temp.path().join("0123456789abcdef/system/css/site.css");
        assert_eq!(std::fs::read(written).unwrap(), b"body{}");
    }

    #[test]
    fn test_public_url() {
        let storage = LocalStorage::new("/srv/library").with_public_base_url("https://cdn.example.com/content/");
        assert_eq!(
            storage.url_for(&id(), "/images/logo.png"),
            "https://cdn.example.com/content/0123456789abcdef/images/logo.png"
        );
        assert_eq!(storage.url_for(&id(), ""), "https://cdn.example.com/content/0123456789abcdef");
    }

    #[test]
    fn test_local_url() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path());
        let url = storage.url_for(&id(), "index.html");

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/0123456789abcdef/index.html"));
    }
}
