//! Append-only import journal with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL), one file per content
//! item, for easy inspection after an import went wrong.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::{ImportEvent, ImportEventType, Stage};
use crate::library::ContentId;

/// File-based import journal for one content item
pub struct Journal {
    content_id: ContentId,

    /// Path to the events.jsonl file
    events_path: PathBuf,
}

impl Journal {
    /// Create or open the journal of `content_id` under `imports_dir`
    pub async fn open(imports_dir: &Path, content_id: &ContentId) -> Result<Self> {
        let dir = imports_dir.join(content_id.as_str());

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create journal directory: {}", dir.display()))?;

        Ok(Self {
            content_id: content_id.clone(),
            events_path: dir.join("events.jsonl"),
        })
    }

    /// Open a journal in the configured imports directory
    pub async fn open_default(content_id: &ContentId) -> Result<Self> {
        let imports_dir = crate::config::imports_dir()?;
        Self::open(&imports_dir, content_id).await
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &ImportEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Record an event for this content item
    pub async fn record(
        &self,
        stage: Option<Stage>,
        event_type: ImportEventType,
        summary: impl Into<String>,
    ) -> Result<()> {
        let event = ImportEvent::new(self.content_id.as_str(), stage, event_type, summary);
        self.append(&event).await
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<ImportEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: ImportEvent =
                serde_json::from_str(&line).with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// List all content ids that have a journal
    pub async fn list_imports(imports_dir: &Path) -> Result<Vec<ContentId>> {
        if !imports_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(imports_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(id) = entry.file_name().to_str().and_then(|n| ContentId::parse(n).ok()) {
                    ids.push(id);
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Outcome of the latest import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Running,
    Completed,
    Failed,
}

/// State of the latest import attempt, rebuilt from its events
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub status: ImportStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages_completed: Vec<Stage>,
    pub degraded: Vec<String>,
    pub failed_assets: usize,
    pub error: Option<String>,
}

impl ImportSummary {
    /// Fold the events of the most recent attempt. `None` if nothing started.
    pub fn from_events(events: &[ImportEvent]) -> Option<Self> {
        let start = events
            .iter()
            .rposition(|e| e.event_type == ImportEventType::ImportStarted)?;

        let mut summary = ImportSummary {
            status: ImportStatus::Running,
            started_at: events[start].timestamp,
            finished_at: None,
            stages_completed: Vec::new(),
            degraded: Vec::new(),
            failed_assets: 0,
            error: None,
        };

        for event in &events[start + 1..] {
            match event.event_type {
                ImportEventType::ImportStarted => {}
                ImportEventType::StageCompleted => {
                    if let Some(stage) = event.stage {
                        summary.stages_completed.push(stage);
                    }
                }
                ImportEventType::StageDegraded => summary.degraded.push(event.summary.clone()),
                ImportEventType::AssetFailed => summary.failed_assets += 1,
                ImportEventType::ImportCompleted => {
                    summary.status = ImportStatus::Completed;
                    summary.finished_at = Some(event.timestamp);
                }
                ImportEventType::ImportFailed => {
                    summary.status = ImportStatus::Failed;
                    summary.finished_at = Some(event.timestamp);
                    summary.error = event.error.clone();
                }
            }
        }

        Some(summary)
    }
}
