//! Catalog of imported artifacts.
//!
//! Simple JSON-based index that can be searched and filtered. The catalog is
//! the persistence handle of an import job: opened at job start, written back
//! on `close`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::content::ContentId;
use crate::adapters::Persistence;
use crate::domain::{ContentArtifact, ContentKind, Tag};

/// Catalog of all imported content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog format version
    pub version: u32,

    /// All cataloged artifacts
    pub items: Vec<ContentArtifact>,

    /// Where the catalog is written on close
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a new empty, in-memory catalog
    pub fn new() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
            path: None,
        }
    }

    /// Open the catalog stored at `path` (empty if the file does not exist yet)
    pub async fn open(path: &Path) -> Result<Self> {
        let mut catalog = if path.exists() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            serde_json::from_str(&content).context("Failed to parse catalog JSON")?
        } else {
            Self::new()
        };

        catalog.path = Some(path.to_path_buf());
        Ok(catalog)
    }

    /// Write the catalog back to disk and release the handle
    pub async fn close(self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write catalog: {}", path.display()))?;

        Ok(())
    }

    /// Add an artifact, replacing an earlier import of the same content
    pub fn add(&mut self, artifact: ContentArtifact) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == artifact.id) {
            *existing = artifact;
        } else {
            self.items.push(artifact);
        }
    }

    /// Get an artifact by ID
    pub fn get(&self, id: &ContentId) -> Option<&ContentArtifact> {
        self.items.iter().find(|i| &i.id == id)
    }

    /// Remove an artifact by ID
    pub fn remove(&mut self, id: &ContentId) -> Option<ContentArtifact> {
        let pos = self.items.iter().position(|i| &i.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Artifacts carrying a tag
    pub fn with_tag(&self, tag: Tag) -> Vec<&ContentArtifact> {
        self.items.iter().filter(|item| item.tags.contains(&tag)).collect()
    }

    /// Filter artifacts by content kind
    pub fn filter_by_kind(&self, kind: ContentKind) -> Vec<&ContentArtifact> {
        self.items.iter().filter(|item| item.kind == kind).collect()
    }

    /// All artifacts sorted by imported_at (most recent first)
    pub fn list(&self, limit: Option<usize>) -> Vec<&ContentArtifact> {
        let mut items: Vec<_> = self.items.iter().collect();
        items.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        items
    }

    /// Get the number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Persistence for Catalog {
    async fn save_artifact(&mut self, artifact: &ContentArtifact) -> Result<()> {
        self.add(artifact.clone());
        Ok(())
    }

    async fn save_tags(&mut self, content_id: &ContentId, tags: &[Tag]) -> Result<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| &i.id == content_id)
            .with_context(|| format!("No artifact {} in catalog", content_id))?;
        item.tags = tags.to_vec();
        Ok(())
    }
}
