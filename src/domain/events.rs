//! Event types for the import journal.
//!
//! Every import records what each stage did in an append-only log so that
//! truncation or corruption can be diagnosed after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single event in the append-only import journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The content item being imported
    pub content_id: String,

    /// Pipeline stage (if applicable)
    pub stage: Option<Stage>,

    /// Type of event
    pub event_type: ImportEventType,

    /// Human-readable summary with sizes and counts (NO content)
    pub summary: String,

    /// Time taken in milliseconds (for completed stages)
    pub duration_ms: Option<u64>,

    /// Error message if something failed
    pub error: Option<String>,
}

impl ImportEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        content_id: impl Into<String>,
        stage: Option<Stage>,
        event_type: ImportEventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content_id: content_id.into(),
            stage,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    /// Attach duration information
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach error information
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of events recorded during an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEventType {
    /// An import has started
    ImportStarted,

    /// A stage finished normally
    StageCompleted,

    /// A stage finished but kept original content or dropped data
    StageDegraded,

    /// An asset could not be downloaded; its reference is left as-is
    AssetFailed,

    /// The artifact was persisted
    ImportCompleted,

    /// The import was aborted
    ImportFailed,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Scan,
    Placeholders,
    Protect,
    Tokenize,
    Rewrite,
    Tag,
    Restore,
    Localize,
    Inject,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Scan => "scan",
            Stage::Placeholders => "placeholders",
            Stage::Protect => "protect",
            Stage::Tokenize => "tokenize",
            Stage::Rewrite => "rewrite",
            Stage::Tag => "tag",
            Stage::Restore => "restore",
            Stage::Localize => "localize",
            Stage::Inject => "inject",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}
