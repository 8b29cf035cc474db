//! Content import orchestrator.
//!
//! Sequences the pipeline stages for each content kind, records every stage
//! in the import journal, and degrades instead of failing where the error
//! taxonomy allows it (rewrite and tagging failures, failed downloads).

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{
    analyze_tags, ChatRewriter, Fetcher, HttpFetcher, LocalStorage, Persistence, Rewriter, Storage,
    TagAnalysis,
};
use crate::adapters::rewriter::REWRITE_INSTRUCTIONS;
use crate::config::ResolvedConfig;
use crate::domain::{ContentArtifact, ContentKind, Difficulty, ImportEvent, ImportEventType, Stage, TagSet};
use crate::library::{ContentDir, ContentId};

use super::chunker;
use super::error::ImportError;
use super::extractor;
use super::inject::{inject_base, inject_tracking};
use super::journal::Journal;
use super::limits::{ImportLimits, RewriteTracker};
use super::localizer::AssetLocalizer;
use super::placeholders::{self, PlaceholderContext, Processed};
use super::policy::PolicySet;
use super::preview::absolutize;
use super::protect;
use super::scorable;
use super::tokenize;
use super::tokens::TokenMap;

/// Settings that shape an import
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Origin serving `/system/` and `/images/` assets
    pub legacy_origin: String,

    /// Script injected into delivered documents (not emails)
    pub tracking_script_url: String,

    /// Instructions sent with every rewrite call
    pub rewrite_instructions: String,

    pub limits: ImportLimits,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            legacy_origin: "https://www.example.com".to_string(),
            tracking_script_url: "/tracking/track.js".to_string(),
            rewrite_instructions: REWRITE_INSTRUCTIONS.to_string(),
            limits: ImportLimits::default(),
        }
    }
}

/// One upload to import
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub kind: ContentKind,

    /// Archive, HTML document or video file
    pub source: PathBuf,

    /// Values for replace placeholders
    pub context: PlaceholderContext,

    /// Send the document through the rewriter (when one is configured)
    pub rewrite: bool,

    /// Ask the rewriter for tags and difficulty (when one is configured)
    pub analyze: bool,
}

impl ImportRequest {
    pub fn new(kind: ContentKind, source: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
            context: PlaceholderContext::default(),
            rewrite: true,
            analyze: true,
        }
    }

    pub fn with_context(mut self, context: PlaceholderContext) -> Self {
        self.context = context;
        self
    }
}

/// What an import produced, with the counts worth reporting
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub artifact: ContentArtifact,
    pub placeholders: Option<Processed>,
    pub rewrite_calls: u32,
    pub degraded_chunks: u32,
    pub downloaded_assets: usize,
    pub failed_assets: Vec<String>,
    pub rejected_assets: Vec<String>,
}

/// Main import orchestrator
pub struct Importer {
    rewriter: Option<Box<dyn Rewriter>>,
    fetcher: Box<dyn Fetcher>,
    storage: Box<dyn Storage>,
    policies: PolicySet,
    library_dir: PathBuf,
    journal_dir: PathBuf,
    settings: ImportSettings,
}

/// Result of the protect/tokenize/rewrite/restore round-trip
struct Rewritten {
    html: String,
    analysis: TagAnalysis,
    tracker: RewriteTracker,
}

impl Importer {
    /// Create an importer without a rewriter
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        storage: Box<dyn Storage>,
        policies: PolicySet,
        library_dir: impl Into<PathBuf>,
        journal_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rewriter: None,
            fetcher,
            storage,
            policies,
            library_dir: library_dir.into(),
            journal_dir: journal_dir.into(),
            settings: ImportSettings::default(),
        }
    }

    pub fn with_rewriter(mut self, rewriter: Box<dyn Rewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build an importer with the default HTTP and filesystem adapters
    pub fn from_config(config: &ResolvedConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(config.downloads.timeout(), config.downloads.attempts)?;

        let mut storage = LocalStorage::new(&config.library);
        if let Some(base) = &config.storage.public_base_url {
            storage = storage.with_public_base_url(base);
        }

        let policies = PolicySet::load(config.policies_dir.as_deref()).context("Failed to load placeholder policies")?;

        let settings = ImportSettings {
            legacy_origin: config.downloads.legacy_origin.clone(),
            tracking_script_url: config.storage.tracking_script_url.clone(),
            rewrite_instructions: REWRITE_INSTRUCTIONS.to_string(),
            limits: config.limits.clone(),
        };

        let mut importer = Self::new(
            Box::new(fetcher),
            Box::new(storage),
            policies,
            &config.library,
            config.home.join("imports"),
        )
        .with_settings(settings);

        if let Some(endpoint) = &config.rewriter.endpoint {
            let rewriter = ChatRewriter::new(
                endpoint.clone(),
                config.rewriter.model.clone(),
                config.rewriter.api_key.clone(),
                config.rewriter.timeout(),
            )?;
            importer = importer.with_rewriter(Box::new(rewriter));
        }

        Ok(importer)
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import one upload and persist the resulting artifact
    #[instrument(skip(self, request, persistence), fields(kind = %request.kind, source = %request.source.display()))]
    pub async fn import(
        &self,
        request: ImportRequest,
        persistence: &mut dyn Persistence,
    ) -> Result<ImportReport, ImportError> {
        let bytes = fs::read(&request.source).await?;
        let content_id = ContentId::from_bytes(&bytes);
        info!(%content_id, bytes = bytes.len(), "Starting import");

        let journal = Journal::open(&self.journal_dir, &content_id)
            .await
            .map_err(ImportError::Storage)?;
        journal
            .record(
                None,
                ImportEventType::ImportStarted,
                format!("Import of {} ({} bytes) started", request.kind, bytes.len()),
            )
            .await
            .map_err(ImportError::Storage)?;

        let started = Instant::now();
        let result = self.run_import(&request, bytes, &content_id, &journal, persistence).await;

        match result {
            Ok(report) => {
                let event = ImportEvent::new(
                    content_id.as_str(),
                    None,
                    ImportEventType::ImportCompleted,
                    format!("Artifact persisted at {}", report.artifact.location),
                )
                .with_duration(started.elapsed().as_millis() as u64);
                journal.append(&event).await.map_err(ImportError::Storage)?;

                info!(%content_id, duration_ms = started.elapsed().as_millis() as u64, "Import completed");
                Ok(report)
            }
            Err(e) => {
                error!(%content_id, error = %e, "Import failed");
                let event = ImportEvent::new(
                    content_id.as_str(),
                    None,
                    ImportEventType::ImportFailed,
                    "Import aborted",
                )
                .with_error(e.to_string());
                if let Err(journal_error) = journal.append(&event).await {
                    warn!(error = %journal_error, "Failed to journal import failure");
                }
                Err(e)
            }
        }
    }

    async fn run_import(
        &self,
        request: &ImportRequest,
        bytes: Vec<u8>,
        content_id: &ContentId,
        journal: &Journal,
        persistence: &mut dyn Persistence,
    ) -> Result<ImportReport, ImportError> {
        let content = ContentDir::new(&self.library_dir, content_id.clone());

        if request.kind == ContentKind::Video {
            return self.import_video(request, &bytes, &content, journal, persistence).await;
        }

        // Load the entry document
        let (source_html, entry_path, scorable) = match request.kind {
            ContentKind::Package => {
                let stage_start = Instant::now();
                content.ensure().await.map_err(ImportError::Storage)?;

                let archive = request.source.clone();
                let root = content.root().to_path_buf();
                let limits = self.settings.limits.clone();
                let extracted = tokio::task::spawn_blocking(move || extractor::extract(&archive, &root, &limits))
                    .await
                    .map_err(std::io::Error::other)??;

                record_stage(
                    journal,
                    Stage::Extract,
                    stage_start,
                    format!(
                        "{} files extracted, {} skipped, entry {}",
                        extracted.files, extracted.skipped, extracted.entry_relative
                    ),
                )
                .await?;

                let stage_start = Instant::now();
                let root = content.root().to_path_buf();
                let scorable = tokio::task::spawn_blocking(move || scorable::is_scorable(&root))
                    .await
                    .map_err(std::io::Error::other)?;
                record_stage(journal, Stage::Scan, stage_start, format!("scorable: {}", scorable)).await?;

                let html = String::from_utf8_lossy(&fs::read(&extracted.entry).await?).into_owned();
                (html, extracted.entry_relative, scorable)
            }
            _ => (
                String::from_utf8_lossy(&bytes).into_owned(),
                request.kind.default_entry_name().to_string(),
                false,
            ),
        };

        self.settings.limits.validate_input(&source_html)?;

        let rules = match request.kind.policy_name() {
            Some(name) => Some(
                self.policies
                    .get(name)
                    .map_err(|e| ImportError::validation("placeholder policy", vec![e.to_string()]))?,
            ),
            None => None,
        };

        // Emails are checked on the source document, before anything is sent out
        let mut placeholder_summary = None;
        let mut html = source_html;
        if let (ContentKind::Email, Some(rules)) = (request.kind, rules) {
            let stage_start = Instant::now();
            let outcome = placeholders::process(&html, rules, &request.context).into_result()?;
            record_stage(journal, Stage::Placeholders, stage_start, processed_summary(&outcome.processed)).await?;
            html = outcome.html;
            placeholder_summary = Some(outcome.processed);
        }

        let rewritten = self.rewrite_document(&html, request, journal).await?;
        let mut html = rewritten.html;

        // Packages and landing pages are checked on the final document
        if let (ContentKind::Package | ContentKind::RawHtml, Some(rules)) = (request.kind, rules) {
            let stage_start = Instant::now();
            let outcome = placeholders::process(&html, rules, &request.context).into_result()?;
            record_stage(journal, Stage::Placeholders, stage_start, processed_summary(&outcome.processed)).await?;
            html = outcome.html;
            placeholder_summary = Some(outcome.processed);
        }

        // Localize assets
        let stage_start = Instant::now();
        content.ensure().await.map_err(ImportError::Storage)?;
        let asset_base = self.storage.url_for(content_id, "");
        let localizer = AssetLocalizer::new(
            self.fetcher.as_ref(),
            &content,
            self.settings.legacy_origin.clone(),
            asset_base.clone(),
        );
        let localized = localizer.localize(&html).await?;

        for failed in &localized.failed {
            journal
                .record(Some(Stage::Localize), ImportEventType::AssetFailed, format!("Download failed: {}", failed))
                .await
                .map_err(ImportError::Storage)?;
        }
        if !localized.rejected.is_empty() {
            let err = ImportError::validation("unsafe asset paths", localized.rejected.clone());
            warn!(error = %err, "Dropped asset references");
            journal
                .record(Some(Stage::Localize), ImportEventType::StageDegraded, err.to_string())
                .await
                .map_err(ImportError::Storage)?;
        }
        record_stage(
            journal,
            Stage::Localize,
            stage_start,
            format!(
                "{} downloaded, {} failed, {} rejected",
                localized.downloaded.len(),
                localized.failed.len(),
                localized.rejected.len()
            ),
        )
        .await?;

        // Base tag, tracking script, preview
        let stage_start = Instant::now();
        let entry_dir = entry_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let document_base = self.storage.url_for(content_id, entry_dir);

        let mut delivered = inject_base(&localized.html, &document_base);
        if request.kind != ContentKind::Email {
            delivered = inject_tracking(&delivered, &self.settings.tracking_script_url);
        }
        let preview_html = absolutize(&localized.html, &self.storage.url_for(content_id, &entry_path));

        self.storage
            .store(content_id, &entry_path, delivered.as_bytes())
            .await
            .map_err(ImportError::Storage)?;
        record_stage(
            journal,
            Stage::Inject,
            stage_start,
            format!("{} bytes delivered, {} bytes preview", delivered.len(), preview_html.len()),
        )
        .await?;

        // Persist
        let stage_start = Instant::now();
        let mut artifact = ContentArtifact::new(content_id.clone(), request.kind, asset_base).with_entry_path(&entry_path);
        artifact.scorable = scorable;
        artifact.tags = rewritten.analysis.tags.into_vec();
        artifact.difficulty = rewritten.analysis.difficulty;
        artifact.preview_html = preview_html;

        persist(persistence, &artifact).await?;
        record_stage(journal, Stage::Persist, stage_start, format!("{} tags", artifact.tags.len())).await?;

        Ok(ImportReport {
            artifact,
            placeholders: placeholder_summary,
            rewrite_calls: rewritten.tracker.calls,
            degraded_chunks: rewritten.tracker.degraded,
            downloaded_assets: localized.downloaded.len(),
            failed_assets: localized.failed,
            rejected_assets: localized.rejected,
        })
    }

    /// Videos are stored as-is
    async fn import_video(
        &self,
        request: &ImportRequest,
        bytes: &[u8],
        content: &ContentDir,
        journal: &Journal,
        persistence: &mut dyn Persistence,
    ) -> Result<ImportReport, ImportError> {
        let stage_start = Instant::now();
        let entry_path = video_file_name(&request.source);

        self.storage
            .store(content.id(), &entry_path, bytes)
            .await
            .map_err(ImportError::Storage)?;

        let location = self.storage.url_for(content.id(), "");
        let artifact = ContentArtifact::new(content.id().clone(), ContentKind::Video, location).with_entry_path(entry_path);

        persist(persistence, &artifact).await?;
        record_stage(journal, Stage::Persist, stage_start, format!("video stored ({} bytes)", bytes.len())).await?;

        Ok(ImportReport {
            artifact,
            placeholders: None,
            rewrite_calls: 0,
            degraded_chunks: 0,
            downloaded_assets: 0,
            failed_assets: Vec::new(),
            rejected_assets: Vec::new(),
        })
    }

    /// Protect, tokenize, rewrite chunk by chunk, restore.
    ///
    /// A chunk whose rewrite fails, loses tokens or changes size out of band
    /// keeps its original text. Tagging failures leave the chunk untagged.
    async fn rewrite_document(
        &self,
        html: &str,
        request: &ImportRequest,
        journal: &Journal,
    ) -> Result<Rewritten, ImportError> {
        let mut tracker = RewriteTracker::new();
        let mut analysis = TagAnalysis::default();

        let Some(rewriter) = self.rewriter.as_deref() else {
            return Ok(Rewritten {
                html: html.to_string(),
                analysis,
                tracker,
            });
        };
        if !request.rewrite && !request.analyze {
            return Ok(Rewritten {
                html: html.to_string(),
                analysis,
                tracker,
            });
        }

        let stage_start = Instant::now();
        let protected = protect::protect(html);
        let tokenized = tokenize::tokenize(&protected.html);
        record_stage(
            journal,
            Stage::Tokenize,
            stage_start,
            format!(
                "{} protected blocks, {} references",
                protected.blocks.len(),
                tokenized.references.len()
            ),
        )
        .await?;

        let chunks = chunker::split(&tokenized.html, self.settings.limits.max_chunk_bytes);
        debug!(chunks = chunks.len(), bytes = tokenized.html.len(), "Split document for rewriting");

        let stage_start = Instant::now();
        let mut rewritten_chunks = Vec::with_capacity(chunks.len());
        let mut tags = TagSet::new();
        let mut difficulty: Option<Difficulty> = None;

        for chunk in &chunks {
            if request.analyze {
                match analyze_tags(rewriter, &chunk.content).await {
                    Ok(found) => {
                        tags.union_with(&found.tags);
                        difficulty = difficulty.max(found.difficulty);
                    }
                    Err(e) => {
                        let err = ImportError::external(rewriter.name(), &e);
                        warn!(chunk = chunk.index, error = %err, "Tagging failed; continuing without tags");
                        journal
                            .record(Some(Stage::Tag), ImportEventType::StageDegraded, err.to_string())
                            .await
                            .map_err(ImportError::Storage)?;
                    }
                }
            }

            if !request.rewrite {
                rewritten_chunks.push(chunk.content.clone());
                continue;
            }

            let degraded = match rewriter.rewrite(&chunk.content, &self.settings.rewrite_instructions).await {
                Ok(output) => {
                    tracker.record_call(chunk.content.len(), output.len());
                    match self.check_chunk(&chunk.content, &output, &protected.blocks, &tokenized.references) {
                        Ok(()) => {
                            rewritten_chunks.push(output);
                            None
                        }
                        Err(reason) => Some(reason),
                    }
                }
                Err(e) => Some(ImportError::external(rewriter.name(), &e).to_string()),
            };

            if let Some(reason) = degraded {
                tracker.record_degraded();
                warn!(chunk = chunk.index, reason = %reason, "Keeping original chunk");
                journal
                    .record(
                        Some(Stage::Rewrite),
                        ImportEventType::StageDegraded,
                        format!("chunk {}: {}", chunk.index, reason),
                    )
                    .await
                    .map_err(ImportError::Storage)?;
                rewritten_chunks.push(chunk.content.clone());
            }
        }

        record_stage(
            journal,
            Stage::Rewrite,
            stage_start,
            format!(
                "{} chunks, {} calls, {} degraded, {} -> {} bytes",
                chunks.len(),
                tracker.calls,
                tracker.degraded,
                tracker.input_bytes,
                tracker.output_bytes
            ),
        )
        .await?;

        let stage_start = Instant::now();
        let reassembled = chunker::reassemble(&rewritten_chunks);
        let missing = tokenized.references.missing_in(&reassembled).len() + protected.blocks.missing_in(&reassembled).len();
        let restored = protect::restore(&tokenize::detokenize(&reassembled, &tokenized.references), &protected.blocks);

        if let Err(violation) = self.settings.limits.check_ratio(html.len(), restored.len()) {
            warn!(%violation, "Rewritten document size out of band");
            journal
                .record(Some(Stage::Restore), ImportEventType::StageDegraded, violation.to_string())
                .await
                .map_err(ImportError::Storage)?;
        }
        record_stage(
            journal,
            Stage::Restore,
            stage_start,
            format!("{} bytes restored, {} tokens missing", restored.len(), missing),
        )
        .await?;

        analysis.tags = tags;
        analysis.difficulty = difficulty;

        Ok(Rewritten {
            html: restored,
            analysis,
            tracker,
        })
    }

    /// Reason to discard a rewritten chunk, if any
    fn check_chunk(&self, original: &str, output: &str, blocks: &TokenMap, references: &TokenMap) -> Result<(), String> {
        let lost = blocks
            .iter()
            .chain(references.iter())
            .filter(|(token, _)| original.contains(token) && !output.contains(token))
            .count();
        if lost > 0 {
            return Err(format!("{} tokens lost", lost));
        }

        self.settings
            .limits
            .check_ratio(original.len(), output.len())
            .map_err(|violation| violation.to_string())
    }
}

async fn record_stage(journal: &Journal, stage: Stage, started: Instant, summary: String) -> Result<(), ImportError> {
    let duration_ms = started.elapsed().as_millis() as u64;
    debug!(%stage, duration_ms, summary = %summary, "Stage completed");

    let event = ImportEvent::new(
        journal.content_id().as_str(),
        Some(stage),
        ImportEventType::StageCompleted,
        summary,
    )
    .with_duration(duration_ms);
    journal.append(&event).await.map_err(ImportError::Storage)
}

async fn persist(persistence: &mut dyn Persistence, artifact: &ContentArtifact) -> Result<(), ImportError> {
    persistence
        .save_artifact(artifact)
        .await
        .map_err(ImportError::Storage)?;
    persistence
        .save_tags(&artifact.id, &artifact.tags)
        .await
        .map_err(ImportError::Storage)
}

fn processed_summary(processed: &Processed) -> String {
    format!(
        "{} ignored, {} stripped, {} replaced",
        processed.ignored.len(),
        processed.stripped.len(),
        processed.replaced.len()
    )
}

/// Stored name of an uploaded video
fn video_file_name(source: &Path) -> String {
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    format!("video.{}", extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_file_name() {
        assert_eq!(video_file_name(Path::new("/tmp/Intro.MP4")), "video.mp4");
        assert_eq!(video_file_name(Path::new("/tmp/clip")), "video.bin");
        assert_eq!(video_file_name(Path::new("/tmp/x.m$v")), "video.bin");
    }

    #[test]
    fn test_request_defaults() {
        let request = ImportRequest::new(ContentKind::Email, "/tmp/a.html");
        assert!(request.rewrite);
        assert!(request.analyze);
    }

    #[test]
    fn test_processed_summary() {
        let processed = Processed {
            ignored: vec!["A".to_string()],
            stripped: vec![],
            replaced: vec!["B".to_string(), "C".to_string()],
        };
        assert_eq!(processed_summary(&processed), "1 ignored, 0 stripped, 2 replaced");
    }
}
