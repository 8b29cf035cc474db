//! Command-line interface for lureforge.
//!
//! Provides commands for importing content, dry-running placeholder policies,
//! inspecting chunking, and browsing the catalog and import journals.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::{
    chunker, placeholders, ImportRequest, ImportSummary, Importer, Journal, PlaceholderContext, PolicySet,
};
use crate::domain::{ContentKind, Tag};
use crate::library::{Catalog, ContentId};

/// lureforge - import third-party HTML content for safe delivery
#[derive(Parser, Debug)]
#[command(name = "lureforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import an archive, email, landing page or video
    Import {
        /// Content kind
        #[arg(short, long, value_enum)]
        kind: KindArg,

        /// File to import
        source: PathBuf,

        /// Sender display name for FROM_FRIENDLY_NAME placeholders
        #[arg(long)]
        from_name: Option<String>,

        /// Skip prose rewriting
        #[arg(long)]
        no_rewrite: bool,

        /// Skip tag analysis
        #[arg(long)]
        no_analyze: bool,

        /// Print the import report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the placeholder policy over a document without importing it
    Check {
        #[arg(short, long, value_enum)]
        kind: KindArg,

        /// HTML document
        file: PathBuf,

        #[arg(long)]
        from_name: Option<String>,
    },

    /// Show how a document would be chunked for the rewriter
    Split {
        file: PathBuf,

        /// Maximum chunk size in bytes (configured limit if not given)
        #[arg(short, long)]
        max_size: Option<usize>,
    },

    /// Show details of an imported artifact
    Show {
        /// Content ID (prefix match)
        content_id: String,

        /// Print the preview HTML
        #[arg(long)]
        preview: bool,
    },

    /// List imported artifacts
    List {
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Only artifacts with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the state of imports from their journals
    Status {
        /// Content ID (all imports if not given)
        content_id: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Content kind for CLI (maps to ContentKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    /// Archive-based education package
    Package,

    /// Phishing-simulation email
    Email,

    /// Landing page
    RawHtml,

    /// Video file
    Video,
}

impl From<KindArg> for ContentKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Package => ContentKind::Package,
            KindArg::Email => ContentKind::Email,
            KindArg::RawHtml => ContentKind::RawHtml,
            KindArg::Video => ContentKind::Video,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Import {
                kind,
                source,
                from_name,
                no_rewrite,
                no_analyze,
                json,
            } => import_content(kind.into(), source, from_name, !no_rewrite, !no_analyze, json).await,
            Commands::Check { kind, file, from_name } => check_document(kind.into(), &file, from_name),
            Commands::Split { file, max_size } => split_document(&file, max_size),
            Commands::Show { content_id, preview } => show_artifact(&content_id, preview).await,
            Commands::List { kind, tag, limit } => list_artifacts(kind, tag, limit).await,
            Commands::Status { content_id } => show_status(content_id).await,
            Commands::Config => show_config(),
        }
    }
}

fn placeholder_context(from_name: Option<String>) -> PlaceholderContext {
    match from_name {
        Some(name) => PlaceholderContext::new().with_from_name(name),
        None => PlaceholderContext::new(),
    }
}

/// Import one file and record it in the catalog
async fn import_content(
    kind: ContentKind,
    source: PathBuf,
    from_name: Option<String>,
    rewrite: bool,
    analyze: bool,
    json: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let importer = Importer::from_config(cfg)?;

    let mut request = ImportRequest::new(kind, &source).with_context(placeholder_context(from_name));
    request.rewrite = rewrite;
    request.analyze = analyze;

    let mut catalog = Catalog::open(&config::catalog_path()?).await?;
    let result = importer.import(request, &mut catalog).await;
    catalog.close().await?;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Import of {} failed: {}", source.display(), e);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let artifact = &report.artifact;
    println!("Imported {} as {}", source.display(), artifact.id);
    println!("  Kind:       {}", artifact.kind);
    println!("  Location:   {}", artifact.location);
    println!("  Entry:      {}", artifact.entry_path);
    println!("  Scorable:   {}", artifact.scorable);
    if !artifact.tags.is_empty() {
        let tags: Vec<&str> = artifact.tags.iter().map(|t| t.as_str()).collect();
        println!("  Tags:       {}", tags.join(", "));
    }
    if let Some(difficulty) = artifact.difficulty {
        println!("  Difficulty: {}", difficulty);
    }
    if let Some(processed) = &report.placeholders {
        println!(
            "  Placeholders: {} ignored, {} stripped, {} replaced",
            processed.ignored.len(),
            processed.stripped.len(),
            processed.replaced.len()
        );
    }
    println!(
        "  Rewriter:   {} calls, {} chunks kept original",
        report.rewrite_calls, report.degraded_chunks
    );
    println!(
        "  Assets:     {} downloaded, {} failed, {} rejected",
        report.downloaded_assets,
        report.failed_assets.len(),
        report.rejected_assets.len()
    );
    for failed in &report.failed_assets {
        println!("    failed:   {}", failed);
    }
    for rejected in &report.rejected_assets {
        println!("    rejected: {}", rejected);
    }

    Ok(())
}

/// Dry-run the placeholder policy for a document
fn check_document(kind: ContentKind, file: &Path, from_name: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let policies = PolicySet::load(cfg.policies_dir.as_deref())?;

    let Some(policy) = kind.policy_name() else {
        anyhow::bail!("Content kind '{}' has no placeholder policy", kind);
    };
    let rules = policies.get(policy)?;

    let html = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let outcome = placeholders::process(&html, rules, &placeholder_context(from_name));

    if !outcome.success {
        eprintln!("Rejected placeholders ({} policy):", policy);
        for basename in &outcome.rejected {
            eprintln!("  {}", basename);
        }
        std::process::exit(1);
    }

    println!("Policy '{}' accepts {}", policy, file.display());
    println!("  Ignored:  {}", outcome.processed.ignored.join(", "));
    println!("  Stripped: {}", outcome.processed.stripped.join(", "));
    println!("  Replaced: {}", outcome.processed.replaced.join(", "));

    Ok(())
}

/// Print the chunk boundaries of a document
fn split_document(file: &Path, max_size: Option<usize>) -> Result<()> {
    let max_size = match max_size {
        Some(size) => size,
        None => config::config()?.limits.max_chunk_bytes,
    };

    let html = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let chunks = chunker::split(&html, max_size);

    println!("{:<6} {:<10} {:<8} {:<40}", "CHUNK", "OFFSET", "BYTES", "ENDS WITH");
    println!("{}", "-".repeat(66));

    for chunk in &chunks {
        let tail: String = chunk.content.chars().rev().take(30).collect::<Vec<_>>().into_iter().rev().collect();
        println!(
            "{:<6} {:<10} {:<8} {:<40}",
            chunk.index,
            chunk.offset,
            chunk.content.len(),
            tail.replace('\n', " ")
        );
    }

    println!("\nTotal: {} chunks, {} bytes (limit {})", chunks.len(), html.len(), max_size);

    Ok(())
}

/// Show details of a cataloged artifact
async fn show_artifact(content_id: &str, preview: bool) -> Result<()> {
    let catalog = Catalog::open(&config::catalog_path()?).await?;

    // Find the item by ID prefix match
    let item = catalog
        .items
        .iter()
        .find(|i| i.id.as_str().starts_with(content_id))
        .ok_or_else(|| anyhow::anyhow!("Content not found: {}", content_id))?;

    println!("ID:         {}", item.id);
    println!("Kind:       {}", item.kind);
    println!("Location:   {}", item.location);
    println!("Entry:      {}", item.entry_path);
    println!("Scorable:   {}", item.scorable);
    println!("Imported:   {}", item.imported_at);
    if !item.tags.is_empty() {
        let tags: Vec<&str> = item.tags.iter().map(|t| t.as_str()).collect();
        println!("Tags:       {}", tags.join(", "));
    }
    if let Some(difficulty) = item.difficulty {
        println!("Difficulty: {}", difficulty);
    }

    if preview {
        println!("\n{}", item.preview_html);
    } else {
        println!("\nUse --preview to print the preview HTML");
    }

    Ok(())
}

/// List cataloged artifacts
async fn list_artifacts(kind: Option<KindArg>, tag: Option<String>, limit: usize) -> Result<()> {
    let catalog = Catalog::open(&config::catalog_path()?).await?;

    if catalog.is_empty() {
        println!("Catalog is empty. Use 'lureforge import' to add content.");
        return Ok(());
    }

    let mut items = match kind {
        Some(k) => catalog.filter_by_kind(k.into()),
        None => catalog.list(None),
    };

    if let Some(label) = tag {
        let tag = Tag::parse_label(&label).ok_or_else(|| anyhow::anyhow!("Unknown tag: {}", label))?;
        items.retain(|item| item.tags.contains(&tag));
    }

    println!("{:<18} {:<10} {:<9} {:<40}", "ID", "KIND", "SCORABLE", "ENTRY");
    println!("{}", "-".repeat(80));

    for item in items.iter().take(limit) {
        println!(
            "{:<18} {:<10} {:<9} {:<40}",
            item.id.as_str(),
            item.kind.to_string(),
            item.scorable,
            item.entry_path
        );
    }

    println!("\nTotal: {} items", catalog.len());

    Ok(())
}

/// Show import state rebuilt from journals
async fn show_status(content_id: Option<String>) -> Result<()> {
    let imports_dir = config::imports_dir()?;

    let ids = match content_id {
        Some(id) => vec![ContentId::parse(&id)?],
        None => Journal::list_imports(&imports_dir).await?,
    };

    if ids.is_empty() {
        println!("No imports found");
        return Ok(());
    }

    println!("{:<18} {:<10} {:<26} {:<8} {:<8}", "ID", "STATUS", "STARTED", "FAILED", "DEGRADED");
    println!("{}", "-".repeat(74));

    for id in ids {
        let journal = Journal::open(&imports_dir, &id).await?;
        let events = journal.replay().await?;

        let Some(summary) = ImportSummary::from_events(&events) else {
            continue;
        };

        let status = serde_json::to_value(summary.status)?
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        println!(
            "{:<18} {:<10} {:<26} {:<8} {:<8}",
            id.as_str(),
            status,
            summary.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            summary.failed_assets,
            summary.degraded.len()
        );
        if let Some(error) = &summary.error {
            println!("  error: {}", error);
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (journals, catalog): {}", cfg.home.display());
    println!("  Library (content):        {}", cfg.library.display());
    println!("  Imports:                  {}", cfg.home.join("imports").display());
    println!("  Catalog:                  {}", cfg.home.join("catalog.json").display());
    println!(
        "  Policy overrides:         {}",
        cfg.policies_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in only)".to_string())
    );
    println!();
    println!("Rewriter:");
    println!(
        "  Endpoint: {}",
        cfg.rewriter.endpoint.as_deref().unwrap_or("(disabled)")
    );
    println!("  Model:    {}", cfg.rewriter.model);
    println!("  API key:  {}", if cfg.rewriter.api_key.is_some() { "set" } else { "not set" });
    println!("  Timeout:  {}s", cfg.rewriter.timeout_seconds);
    println!();
    println!("Downloads:");
    println!("  Legacy origin: {}", cfg.downloads.legacy_origin);
    println!("  Timeout:       {}s", cfg.downloads.timeout_seconds);
    println!("  Attempts:      {}", cfg.downloads.attempts);
    println!();
    println!("Storage:");
    println!(
        "  Public base URL: {}",
        cfg.storage.public_base_url.as_deref().unwrap_or("(local file URLs)")
    );
    println!("  Tracking script: {}", cfg.storage.tracking_script_url);
    println!();
    println!("Limits:");
    println!("  Max chunk:      {} bytes", cfg.limits.max_chunk_bytes);
    println!("  Size ratio:     {} - {}", cfg.limits.min_ratio, cfg.limits.max_ratio);
    println!("  Max input size: {} bytes", cfg.limits.max_input_bytes);
    println!("  Archive skip:   {}", cfg.limits.archive_denylist.join(", "));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_import() {
        let cli = Cli::try_parse_from([
            "lureforge",
            "import",
            "--kind",
            "raw-html",
            "page.html",
            "--no-rewrite",
        ])
        .unwrap();

        match cli.command {
            Commands::Import { kind, source, no_rewrite, .. } => {
                assert_eq!(ContentKind::from(kind), ContentKind::RawHtml);
                assert_eq!(source, PathBuf::from("page.html"));
                assert!(no_rewrite);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_placeholder_context_from_name() {
        let ctx = placeholder_context(Some("Acme IT".to_string()));
        let html = r#"<span class="placeholder" data-basename="FROM_FRIENDLY_NAME">x</span>"#;
        let rules = PolicySet::builtin().unwrap();
        let outcome = placeholders::process(html, rules.get("email").unwrap(), &ctx);
        assert_eq!(outcome.html, "Acme IT");
    }
}
