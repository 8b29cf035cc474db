//! Scorable content detection.
//!
//! Content is scorable when one of its scripts calls the `RecordTest` scoring
//! callback. Each occurrence of the name is judged on a small window of text
//! around it, never with a whole-file regex, so huge minified bundles stay
//! cheap to scan.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the scoring callback
pub const SCORE_CALLBACK: &str = "RecordTest";

/// Bytes of context inspected on each side of an occurrence
const WINDOW: usize = 64;

/// File extensions that may contain the call
const SCANNED_EXTENSIONS: &[&str] = &["js", "html", "htm", "php"];

static CALL_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*\(").expect("CALL_AFTER regex is valid"));

/// `RecordTest(score) {` in a class body or object literal
static SHORTHAND_DEFINITION_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*\([^()]*\)\s*\{").expect("SHORTHAND_DEFINITION_AFTER regex is valid")
});

static FUNCTION_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s+\z").expect("FUNCTION_BEFORE regex is valid"));

static TYPEOF_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\btypeof\s*\(?\s*(?:[A-Za-z_$][\w$]*\s*\.\s*)*\z").expect("TYPEOF_BEFORE regex is valid")
});

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Whether the occurrence at `start` is an actual call
fn is_call_at(text: &str, start: usize) -> bool {
    let end = start + SCORE_CALLBACK.len();
    let bytes = text.as_bytes();

    // Part of a longer identifier
    if start > 0 && is_identifier_byte(bytes[start - 1]) {
        return false;
    }
    if end < bytes.len() && is_identifier_byte(bytes[end]) {
        return false;
    }

    let before = &text[floor_char_boundary(text, start.saturating_sub(WINDOW))..start];
    let after = &text[end..ceil_char_boundary(text, (end + WINDOW).min(text.len()))];

    CALL_AFTER.is_match(after)
        && !SHORTHAND_DEFINITION_AFTER.is_match(after)
        && !FUNCTION_BEFORE.is_match(before)
        && !TYPEOF_BEFORE.is_match(before)
}

/// Whether `text` calls the scoring callback anywhere
pub fn contains_score_call(text: &str) -> bool {
    text.match_indices(SCORE_CALLBACK)
        .any(|(start, _)| is_call_at(text, start))
}

/// Scan script, HTML and PHP files under `root`
pub fn is_scorable(root: &Path) -> bool {
    let mut scanned = 0usize;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let scanned_type = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext.as_str()));
        if !scanned_type {
            continue;
        }

        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        scanned += 1;

        if contains_score_call(&String::from_utf8_lossy(&bytes)) {
            debug!(file = %entry.path().display(), "Found scoring callback call");
            return true;
        }
    }

    debug!(root = %root.display(), scanned, "No scoring callback call found");
    false
}
