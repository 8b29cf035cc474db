//! Preview HTML with absolute references.
//!
//! The preview is rendered outside the content tree, so every relative
//! `src`/`href`/`url()` is resolved against the entry document's public URL.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::tokens::is_reference_token;

static QUOTED_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s(?i:src|href|poster|background|action|data-src)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("QUOTED_ATTRIBUTE regex is valid")
});

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"((?i:url)\(\s*)(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))(\s*\))"#).expect("CSS_URL regex is valid")
});

fn resolve(base: &Url, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("{{") || is_reference_token(trimmed) {
        return None;
    }
    // Already absolute (any scheme, including data: and mailto:)
    if Url::parse(trimmed).is_ok() {
        return None;
    }
    base.join(trimmed).ok().map(|u| u.to_string())
}

/// Resolve relative references in `html` against `document_url`
pub fn absolutize(html: &str, document_url: &str) -> String {
    let Ok(base) = Url::parse(document_url) else {
        return html.to_string();
    };

    let pass = QUOTED_ATTRIBUTE
        .replace_all(html, |caps: &Captures| {
            let (quote, value) = match (caps.get(2), caps.get(3)) {
                (Some(v), _) => ('"', v.as_str()),
                (None, Some(v)) => ('\'', v.as_str()),
                _ => return caps[0].to_string(),
            };
            match resolve(&base, value) {
                Some(absolute) => format!("{}{}{}{}", &caps[1], quote, absolute, quote),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    CSS_URL
        .replace_all(&pass, |caps: &Captures| {
            let (quote, value) = match (caps.get(2), caps.get(3), caps.get(4)) {
                (Some(v), _, _) => ("\"", v.as_str()),
                (None, Some(v), _) => ("'", v.as_str()),
                (None, None, Some(v)) => ("", v.as_str()),
                _ => return caps[0].to_string(),
            };
            match resolve(&base, value) {
                Some(absolute) => format!("{}{}{}{}{}", &caps[1], quote, absolute, quote, &caps[5]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
