//! Content directories in the library.
//!
//! Every imported item owns one directory named after its content id. All
//! extracted files, downloaded assets and rewritten documents live under it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

/// Content identifier (SHA256(upload)[0:16])
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Create a content ID from the uploaded bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();

        // Take first 8 bytes (16 hex chars)
        Self(hex::encode(&result[..8]))
    }

    /// Parse an id given on the command line.
    ///
    /// Only lowercase hex is accepted so the id is always safe as a directory name.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 16 || !s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            anyhow::bail!("Invalid content ID: {}", s);
        }
        Ok(Self(s.to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directory that holds one content item
#[derive(Debug, Clone)]
pub struct ContentDir {
    id: ContentId,
    root: PathBuf,
}

impl ContentDir {
    /// Content directory for `id` under the library directory
    pub fn new(library_dir: &Path, id: ContentId) -> Self {
        let root = library_dir.join(id.as_str());
        Self { id, root }
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    /// Root of the content tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file relative to the content root
    pub fn join(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// Path of `path` relative to the content root, with forward slashes
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Ensure the content directory exists
    pub async fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create content directory: {}", self.root.display()))?;
        Ok(&self.root)
    }

    /// Remove a partially populated directory after a failed import
    pub async fn remove(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to remove content directory: {}", self.root.display()))?;
        }
        Ok(())
    }
}
