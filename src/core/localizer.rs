//! Asset localization.
//!
//! Makes imported content self-contained. References under `/system/` and
//! `/images/` are downloaded from the legacy origin, protocol-relative CDN
//! references (`//host/path`) into `cdn/{host}/{path}`. Every reference whose
//! download succeeded is rewritten to `{asset_base}/{relative path}`.
//!
//! Paths are validated before anything touches the filesystem; a reference
//! that fails validation is dropped and left as it was.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::ImportError;
use crate::adapters::Fetcher;
use crate::library::ContentDir;

/// Host-relative prefixes served by the legacy origin
pub const HOST_PREFIXES: &[&str] = &["/system/", "/images/"];

/// How deep nested stylesheet imports are followed
const MAX_CSS_DEPTH: usize = 4;

/// A reference in attribute or `url()` position. Group 1 is the context
/// (`src="`, `url('`, ...), group 2 the path up to any query or fragment.
static ASSET_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\s(?i:src|href|poster|data-src|background)\s*=\s*["']?|(?i:url)\(\s*["']?)((?:/(?:system|images)/|//[A-Za-z0-9.-]+\.[A-Za-z]{2,}/)[^"'\s)>?#]*)"#,
    )
    .expect("ASSET_REFERENCE regex is valid")
});

/// Any leftover host-relative prefix in a stylesheet
static CSS_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([("'\s,=])/(system|images)/"#).expect("CSS_PREFIX regex is valid")
});

/// A discovered reference and where it lands in the content tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetReference {
    /// `/system/...` or `/images/...`
    HostRelative { path: String },

    /// `//host/path`
    Cdn { host: String, path: String },
}

impl AssetReference {
    /// Classify a raw reference string
    pub fn parse(reference: &str) -> Option<Self> {
        if let Some(rest) = reference.strip_prefix("//") {
            let (host, path) = rest.split_once('/')?;
            if host.is_empty() {
                return None;
            }
            return Some(AssetReference::Cdn {
                host: host.to_ascii_lowercase(),
                path: format!("/{}", path),
            });
        }

        if HOST_PREFIXES.iter().any(|p| reference.starts_with(p)) {
            return Some(AssetReference::HostRelative {
                path: reference.to_string(),
            });
        }

        None
    }

    /// Destination relative to the content root
    pub fn relative_path(&self) -> String {
        match self {
            AssetReference::HostRelative { path } => path.trim_start_matches('/').to_string(),
            AssetReference::Cdn { host, path } => format!("cdn/{}{}", host, path),
        }
    }

    /// Where to download the asset from
    pub fn source_url(&self, legacy_origin: &str) -> String {
        match self {
            AssetReference::HostRelative { path } => {
                format!("{}{}", legacy_origin.trim_end_matches('/'), path)
            }
            AssetReference::Cdn { host, path } => format!("https://{}{}", host, path),
        }
    }

    fn is_stylesheet(&self) -> bool {
        self.relative_path().to_ascii_lowercase().ends_with(".css")
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./~+@".contains(c)
}

/// Check a host-relative asset path before it is written under `root`.
///
/// The path must start with one of the fixed prefixes, contain no `..`
/// segment and only safe characters, and the nearest existing ancestor of its
/// local destination must resolve inside the canonical content root.
pub fn is_valid_path(path: &str, root: &Path) -> bool {
    if !HOST_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return false;
    }
    is_contained(path.trim_start_matches('/'), root)
}

/// Containment check shared by host-relative and CDN destinations
pub fn is_contained(relative: &str, root: &Path) -> bool {
    if relative.is_empty() || !relative.chars().all(is_safe_char) {
        return false;
    }
    if relative.split('/').any(|segment| segment == "..") {
        return false;
    }

    let Ok(canonical_root) = root.canonicalize() else {
        return false;
    };

    // Walk up to the nearest entry that exists; the target usually does not yet
    let mut candidate = root.join(relative);
    while !candidate.exists() {
        if !candidate.pop() {
            return false;
        }
    }

    candidate
        .canonicalize()
        .map(|resolved| resolved.starts_with(&canonical_root))
        .unwrap_or(false)
}

fn validate(reference: &AssetReference, root: &Path) -> bool {
    match reference {
        AssetReference::HostRelative { path } => is_valid_path(path, root),
        AssetReference::Cdn { .. } => is_contained(&reference.relative_path(), root),
    }
}

/// Distinct references in document order
pub fn discover(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ASSET_REFERENCE
        .captures_iter(text)
        .map(|caps| caps[2].to_string())
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Outcome of localizing one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct Localized {
    pub html: String,

    /// Relative paths written during this pass
    pub downloaded: Vec<String>,

    /// References whose download failed (left unrewritten)
    pub failed: Vec<String>,

    /// References that failed path validation (left unrewritten)
    pub rejected: Vec<String>,
}

/// Downloads and rewrites the assets of one content item
pub struct AssetLocalizer<'a> {
    fetcher: &'a dyn Fetcher,
    content: &'a ContentDir,
    legacy_origin: String,
    asset_base: String,
}

impl<'a> AssetLocalizer<'a> {
    /// `asset_base` is the public location of the content root
    pub fn new(
        fetcher: &'a dyn Fetcher,
        content: &'a ContentDir,
        legacy_origin: impl Into<String>,
        asset_base: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            content,
            legacy_origin: legacy_origin.into(),
            asset_base: asset_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn public_path(&self, relative: &str) -> String {
        format!("{}/{}", self.asset_base, relative)
    }

    /// Make sure `reference` exists locally. Returns false when it could not be fetched.
    async fn materialize(&self, reference: &AssetReference, report: &mut Localized) -> Result<bool, ImportError> {
        let relative = reference.relative_path();
        let destination = self.content.join(&relative);

        if destination.exists() {
            debug!(path = %relative, "Asset already present");
            return Ok(true);
        }

        let url = reference.source_url(&self.legacy_origin);
        let bytes = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = ImportError::Download {
                    url,
                    message: format!("{:#}", e),
                };
                warn!(error = %err, "Asset left unrewritten");
                return Ok(false);
            }
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&destination, &bytes).await?;

        debug!(path = %relative, bytes = bytes.len(), "Downloaded asset");
        report.downloaded.push(relative);
        Ok(true)
    }

    /// Localize every reference in `html`
    pub async fn localize(&self, html: &str) -> Result<Localized, ImportError> {
        let root = self.content.root();
        let mut report = Localized::default();
        let mut rewrites: HashMap<String, String> = HashMap::new();
        let mut stylesheets: VecDeque<(String, usize)> = VecDeque::new();

        for raw in discover(html) {
            let Some(reference) = AssetReference::parse(&raw) else {
                continue;
            };

            if !validate(&reference, root) {
                warn!(reference = %raw, "Rejected unsafe asset path");
                report.rejected.push(raw);
                continue;
            }

            if !self.materialize(&reference, &mut report).await? {
                report.failed.push(raw);
                continue;
            }

            let relative = reference.relative_path();
            if reference.is_stylesheet() {
                stylesheets.push_back((relative.clone(), 0));
            }
            rewrites.insert(raw, self.public_path(&relative));
        }

        self.localize_stylesheets(stylesheets, &mut report).await?;

        let rewritten = ASSET_REFERENCE
            .replace_all(html, |caps: &Captures| match rewrites.get(&caps[2]) {
                Some(new_path) => format!("{}{}", &caps[1], new_path),
                None => caps[0].to_string(),
            })
            .into_owned();

        info!(
            content_id = %self.content.id(),
            rewritten = rewrites.len(),
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            rejected = report.rejected.len(),
            "Localized assets"
        );

        report.html = rewritten;
        Ok(report)
    }

    /// Fetch what downloaded stylesheets reference, then repoint their prefixes
    async fn localize_stylesheets(
        &self,
        mut queue: VecDeque<(String, usize)>,
        report: &mut Localized,
    ) -> Result<(), ImportError> {
        let root = self.content.root();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some((relative, depth)) = queue.pop_front() {
            if !visited.insert(relative.clone()) {
                continue;
            }

            let path = self.content.join(&relative);
            let css = String::from_utf8_lossy(&fs::read(&path).await?).into_owned();

            for raw in discover(&css) {
                let Some(reference @ AssetReference::HostRelative { .. }) = AssetReference::parse(&raw) else {
                    continue;
                };

                if !validate(&reference, root) {
                    warn!(reference = %raw, stylesheet = %relative, "Rejected unsafe asset path");
                    report.rejected.push(raw);
                    continue;
                }

                if !self.materialize(&reference, report).await? {
                    report.failed.push(raw);
                    continue;
                }

                if reference.is_stylesheet() && depth + 1 < MAX_CSS_DEPTH {
                    queue.push_back((reference.relative_path(), depth + 1));
                }
            }

            let base = self.asset_base.as_str();
            let repointed = CSS_PREFIX
                .replace_all(&css, |caps: &Captures| format!("{}{}/{}/", &caps[1], base, &caps[2]))
                .into_owned();

            if repointed != css {
                fs::write(&path, repointed).await?;
            }
            debug!(stylesheet = %relative, depth, "Localized stylesheet");
        }

        Ok(())
    }
}
