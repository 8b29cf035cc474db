//! Content artifacts produced by an import.
//!
//! An artifact is created once per upload and filled in by the orchestrator
//! while the import runs. After persistence it is only replaced by a re-import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tags::{Difficulty, Tag};
use crate::library::ContentId;

/// The stored, deliverable form of an imported content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentArtifact {
    /// Content identifier
    pub id: ContentId,

    /// Kind of content that was imported
    pub kind: ContentKind,

    /// Local relative path or object-storage URL of the content root
    pub location: String,

    /// Path of the entry document, relative to the content root
    pub entry_path: String,

    /// Whether the content reports a score through the scoring callback
    #[serde(default)]
    pub scorable: bool,

    /// Tags from the controlled vocabulary
    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Difficulty rating (if the analysis produced one)
    pub difficulty: Option<Difficulty>,

    /// Entry document with every relative reference made absolute
    #[serde(default)]
    pub preview_html: String,

    /// When the import finished
    pub imported_at: DateTime<Utc>,
}

impl ContentArtifact {
    /// Create an empty artifact for a content item
    pub fn new(id: ContentId, kind: ContentKind, location: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            location: location.into(),
            entry_path: String::new(),
            scorable: false,
            tags: Vec::new(),
            difficulty: None,
            preview_html: String::new(),
            imported_at: Utc::now(),
        }
    }

    /// Set the entry document path
    pub fn with_entry_path(mut self, entry_path: impl Into<String>) -> Self {
        self.entry_path = entry_path.into();
        self
    }
}

/// Kind of uploaded content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Archive-based education package (SCORM or plain HTML)
    Package,

    /// Single phishing-simulation email document
    Email,

    /// Raw HTML document (landing page)
    RawHtml,

    /// Video file, stored as-is
    Video,
}

impl ContentKind {
    /// Name of the placeholder rule table that governs this kind
    pub fn policy_name(&self) -> Option<&'static str> {
        match self {
            ContentKind::Package => Some("education"),
            ContentKind::Email => Some("email"),
            ContentKind::RawHtml => Some("landing"),
            ContentKind::Video => None,
        }
    }

    /// File name used for single-document entry files
    pub fn default_entry_name(&self) -> &'static str {
        match self {
            ContentKind::Email => "email.html",
            _ => "index.html",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Package => write!(f, "package"),
            ContentKind::Email => write!(f, "email"),
            ContentKind::RawHtml => write!(f, "raw_html"),
            ContentKind::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "package" | "scorm" | "education" => Ok(ContentKind::Package),
            "email" => Ok(ContentKind::Email),
            "raw_html" | "raw-html" | "html" | "landing" => Ok(ContentKind::RawHtml),
            "video" => Ok(ContentKind::Video),
            _ => anyhow::bail!("Unknown content kind: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let artifact = ContentArtifact::new(
            ContentId::from_bytes(b"archive"),
            ContentKind::Package,
            "/content/abc",
        )
        .with_entry_path("index.html");

        assert_eq!(artifact.kind, ContentKind::Package);
        assert_eq!(artifact.entry_path, "index.html");
        assert!(!artifact.scorable);
        assert!(artifact.tags.is_empty());
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = ContentArtifact::new(
            ContentId::from_bytes(b"email"),
            ContentKind::RawHtml,
            "https://cdn.example.com/content/abc",
        );

        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"kind\":\"raw_html\""));

        let parsed: ContentArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.location, "https://cdn.example.com/content/abc");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("package".parse::<ContentKind>().unwrap(), ContentKind::Package);
        assert_eq!("scorm".parse::<ContentKind>().unwrap(), ContentKind::Package);
        assert_eq!("raw-html".parse::<ContentKind>().unwrap(), ContentKind::RawHtml);
        assert_eq!("EMAIL".parse::<ContentKind>().unwrap(), ContentKind::Email);
        assert!("pdf".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(ContentKind::Email.policy_name(), Some("email"));
        assert_eq!(ContentKind::Package.policy_name(), Some("education"));
        assert_eq!(ContentKind::RawHtml.policy_name(), Some("landing"));
        assert_eq!(ContentKind::Video.policy_name(), None);
    }
}
