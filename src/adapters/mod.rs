//! Adapter interfaces for external collaborators.
//!
//! The import pipeline only talks to the outside world through these traits:
//! the content rewriter, the asset fetcher, file storage and persistence.
//! Default implementations are backed by native HTTP and filesystem calls.

pub mod fetch;
pub mod rewriter;
pub mod storage;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ContentArtifact, Tag};
use crate::library::ContentId;

pub use fetch::HttpFetcher;
pub use rewriter::{analyze_tags, ChatRewriter, TagAnalysis};
pub use storage::LocalStorage;

/// Opaque text-in/text-out rewriting service
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Rewrite `text` following `instructions`. Output may be truncated.
    async fn rewrite(&self, text: &str, instructions: &str) -> Result<String>;
}

/// Download primitive for legacy-origin and CDN assets
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Local or object storage for content files
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `bytes` at `relative_path` inside the content tree
    async fn store(&self, content_id: &ContentId, relative_path: &str, bytes: &[u8]) -> Result<()>;

    /// Public location of a stored file (local path or URL)
    fn url_for(&self, content_id: &ContentId, relative_path: &str) -> String;
}

/// Artifact persistence, opened at job start and closed at job end
#[async_trait]
pub trait Persistence: Send {
    async fn save_artifact(&mut self, artifact: &ContentArtifact) -> Result<()>;

    async fn save_tags(&mut self, content_id: &ContentId, tags: &[Tag]) -> Result<()>;
}
