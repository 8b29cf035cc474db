//! Reference tokenization.
//!
//! Swaps URL-bearing attribute values and CSS `url()` arguments for opaque
//! tokens so an external rewriter cannot "fix" paths it cannot resolve. Only
//! the value bytes change; quotes, attribute names and whitespace are kept.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::tokens::{contains_reference_token, TokenKind, TokenMap};

/// URL-bearing attributes. The leading whitespace keeps `src` from matching
/// inside `data-src`.
static URL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\s(?:src|href|srcset|poster|data-src|data-href|action|background)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#,
    )
    .expect("URL_ATTRIBUTE regex is valid")
});

static STYLE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\sstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("STYLE_ATTRIBUTE regex is valid")
});

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)").expect("STYLE_BLOCK regex is valid")
});

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#).expect("CSS_URL regex is valid")
});

/// Document with its references swapped for tokens
#[derive(Debug, Clone)]
pub struct Tokenized {
    pub html: String,
    pub references: TokenMap,
}

/// Values that never get a token.
///
/// A value already holding a token keeps it in place; wrapping it in a second
/// token would hide the inner one from a single-pass restore.
fn passes_through(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || contains_reference_token(trimmed) {
        return true;
    }

    let lower = trimmed.to_ascii_lowercase();
    ["data:", "javascript:", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Rebuild the whole match with the first participating value group replaced
fn splice_value(caps: &Captures, map: &mut TokenMap) -> String {
    let whole = caps.get(0).map_or("", |m| m.as_str());
    let Some(value) = (1..caps.len()).find_map(|i| caps.get(i)) else {
        return whole.to_string();
    };

    if passes_through(value.as_str()) {
        return whole.to_string();
    }

    let offset = caps.get(0).map_or(0, |m| m.start());
    let token = map.issue(value.as_str());
    format!(
        "{}{}{}",
        &whole[..value.start() - offset],
        token,
        &whole[value.end() - offset..]
    )
}

fn tokenize_css_urls(css: &str, map: &mut TokenMap) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures| splice_value(caps, map))
        .into_owned()
}

/// Tokenize every reference in `html`.
///
/// Values that already contain a token, `data:`, `javascript:` and `mailto:` URIs pass
/// through untouched, so tokenizing twice is a no-op.
pub fn tokenize(html: &str) -> Tokenized {
    let mut map = TokenMap::for_document(TokenKind::AssetReference, html);

    let pass = URL_ATTRIBUTE
        .replace_all(html, |caps: &Captures| splice_value(caps, &mut map))
        .into_owned();

    let pass = STYLE_ATTRIBUTE
        .replace_all(&pass, |caps: &Captures| {
            let whole = &caps[0];
            let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
                return whole.to_string();
            };
            let offset = caps.get(0).map_or(0, |m| m.start());
            format!(
                "{}{}{}",
                &whole[..value.start() - offset],
                tokenize_css_urls(value.as_str(), &mut map),
                &whole[value.end() - offset..]
            )
        })
        .into_owned();

    let pass = STYLE_BLOCK
        .replace_all(&pass, |caps: &Captures| {
            format!(
                "{}{}{}",
                &caps[1],
                tokenize_css_urls(&caps[2], &mut map),
                &caps[3]
            )
        })
        .into_owned();

    debug!(references = map.len(), bytes = html.len(), "Tokenized references");

    Tokenized {
        html: pass,
        references: map,
    }
}

/// Tokenize a stand-alone stylesheet
pub fn tokenize_css(css: &str) -> Tokenized {
    let mut map = TokenMap::for_document(TokenKind::AssetReference, css);
    let html = tokenize_css_urls(css, &mut map);
    Tokenized {
        html,
        references: map,
    }
}

/// Put every reference back
pub fn detokenize(html: &str, references: &TokenMap) -> String {
    references.restore(html)
}
