//! Base-URL and tracking-script injection into entry documents.

use std::sync::LazyLock;

use regex::Regex;

static BASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<base\b[^>]*>").expect("BASE_TAG regex is valid"));

static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").expect("HEAD_OPEN regex is valid"));

static HTML_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html\b[^>]*>").expect("HTML_OPEN regex is valid"));

static BODY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("BODY_CLOSE regex is valid"));

fn insert_at(html: &str, at: usize, fragment: &str) -> String {
    format!("{}{}{}", &html[..at], fragment, &html[at..])
}

/// Point relative references at `base_url`.
///
/// An existing `<base>` tag is replaced; otherwise the tag goes right after
/// `<head>`, after `<html>` when there is no head, or in front of everything.
pub fn inject_base(html: &str, base_url: &str) -> String {
    let href = format!("{}/", base_url.trim_end_matches('/'));
    let tag = format!(
        "<base href=\"{}\">",
        html_escape::encode_double_quoted_attribute(&href)
    );

    if let Some(existing) = BASE_TAG.find(html) {
        return format!("{}{}{}", &html[..existing.start()], tag, &html[existing.end()..]);
    }

    match HEAD_OPEN.find(html).or_else(|| HTML_OPEN.find(html)) {
        Some(open) => insert_at(html, open.end(), &tag),
        None => format!("{}{}", tag, html),
    }
}

/// Add the tracking script before the last `</body>` (appended when there is none)
pub fn inject_tracking(html: &str, script_url: &str) -> String {
    let tag = format!(
        "<script src=\"{}\"></script>",
        html_escape::encode_double_quoted_attribute(script_url)
    );

    match BODY_CLOSE.find_iter(html).last() {
        Some(close) => insert_at(html, close.start(), &tag),
        None => format!("{}{}", html, tag),
    }
}
