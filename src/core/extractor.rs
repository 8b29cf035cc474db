//! Package extraction.
//!
//! Archive entries are written one at a time so Windows-style `\` separators
//! can be normalized before directories are created. The entry document is
//! then located by filename convention.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::error::ExtractionError;
use super::limits::ImportLimits;

/// Entry documents looked for at the archive root, in priority order
pub const ROOT_ENTRY_NAMES: &[&str] = &[
    "index.html",
    "index_scorm.html",
    "index_lms.html",
    "story.html",
    "launch.html",
    "default.html",
    "start.html",
];

/// Entry documents looked for anywhere in the tree
pub const NESTED_ENTRY_NAMES: &[&str] = &["index.html", "index_scorm.html"];

/// Result of unpacking an archive
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Absolute path of the entry document
    pub entry: PathBuf,

    /// Entry document relative to the destination, forward slashes
    pub entry_relative: String,

    /// Files written
    pub files: usize,

    /// Entries skipped by the denylist
    pub skipped: usize,
}

/// Normalize an archive entry name, rejecting anything that could escape `dest`
pub fn normalize_entry_name(raw: &str) -> Result<String, ExtractionError> {
    let name = raw.replace('\\', "/");

    let has_drive = name.len() >= 2 && name.as_bytes()[1] == b':';
    if name.starts_with('/') || has_drive || name.split('/').any(|segment| segment == "..") {
        return Err(ExtractionError::UnsafeEntry(raw.to_string()));
    }

    Ok(name.trim_start_matches("./").to_string())
}

/// Unpack `archive_path` into `dest` and locate the entry document
pub fn extract(archive_path: &Path, dest: &Path, limits: &ImportLimits) -> Result<Extracted, ExtractionError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ExtractionError::CorruptArchive(format!("{}: {}", archive_path.display(), e)))?;

    fs::create_dir_all(dest)?;

    let mut files = 0;
    let mut skipped = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractionError::CorruptArchive(format!("entry {}: {}", i, e)))?;

        let name = normalize_entry_name(entry.name())?;
        if name.is_empty() {
            continue;
        }

        if limits.is_denylisted(&name) {
            debug!(entry = %name, "Skipping denylisted archive entry");
            skipped += 1;
            continue;
        }

        let out_path = dest.join(&name);

        if name.ends_with('/') {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| ExtractionError::CorruptArchive(format!("{}: {}", name, e)))?;
        files += 1;
    }

    let entry = locate_entry(dest).ok_or_else(|| ExtractionError::MissingEntry(dest.display().to_string()))?;
    let entry_relative = relative_name(dest, &entry);

    info!(
        archive = %archive_path.display(),
        files,
        skipped,
        entry = %entry_relative,
        "Extracted package"
    );

    Ok(Extracted {
        entry,
        entry_relative,
        files,
        skipped,
    })
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Find the entry document: known names at the root first, then the
/// shallowest `index.html`/`index_scorm.html` anywhere below
pub fn locate_entry(root: &Path) -> Option<PathBuf> {
    for name in ROOT_ENTRY_NAMES {
        let candidate = root.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_ascii_lowercase();
            NESTED_ENTRY_NAMES.contains(&name.as_str())
        })
        .min_by_key(|e| e.depth())
        .map(|e| e.into_path())
}
