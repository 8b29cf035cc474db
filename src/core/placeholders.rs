//! Placeholder policy enforcement.
//!
//! Template placeholders are spans such as
//! `<span class="placeholder" data-basename="COMPANY_NAME">[Company]</span>`.
//! Processing is all-or-nothing: every distinct basename is classified first,
//! and if any is rejected the document is returned untouched.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::error::ImportError;
use super::policy::{RuleCategory, RuleTable};

static SPAN_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<span\b[^>]*>").expect("SPAN_OPEN regex is valid"));

static SPAN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(/?)span\b[^>]*>").expect("SPAN_TAG regex is valid"));

static PLACEHOLDER_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*["'][^"']*\bplaceholder\b"#).expect("PLACEHOLDER_CLASS regex is valid")
});

static BASENAME_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-basename\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("BASENAME_ATTR regex is valid")
});

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9-]*)\b[^>]*?(/?)>").expect("ANY_TAG regex is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements a strip rule never removes
const STRIP_BARRIERS: &[&str] = &["html", "head", "body"];

/// Values available to replace rules, keyed by basename
#[derive(Debug, Clone, Default)]
pub struct PlaceholderContext {
    values: HashMap<String, String>,
}

impl PlaceholderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a replacement value for a basename
    pub fn with_value(mut self, basename: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(basename.into(), value.into());
        self
    }

    /// The email sender display name (`FROM_FRIENDLY_NAME`)
    pub fn with_from_name(self, name: impl Into<String>) -> Self {
        self.with_value("FROM_FRIENDLY_NAME", name)
    }

    fn value_for(&self, basename: &str, rules: &RuleTable) -> Option<&str> {
        let key = rules.case().normalize(basename);
        self.values
            .iter()
            .find(|(k, _)| rules.case().normalize(k) == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Basenames handled by a successful pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Processed {
    pub ignored: Vec<String>,
    pub stripped: Vec<String>,
    pub replaced: Vec<String>,
}

/// Result of running a rule table over a document
#[derive(Debug, Clone, Serialize)]
pub struct PlaceholderOutcome {
    pub success: bool,
    pub html: String,
    pub rejected: Vec<String>,
    pub processed: Processed,
}

impl PlaceholderOutcome {
    /// Turn a rejection into a validation error
    pub fn into_result(self) -> Result<Self, ImportError> {
        if self.success {
            Ok(self)
        } else {
            Err(ImportError::validation("rejected placeholders", self.rejected))
        }
    }
}

/// A placeholder span found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSpan {
    pub basename: String,
    /// Byte offset of `<span`
    pub start: usize,
    /// Byte offset just past the closing `</span>`
    pub end: usize,
}

/// End of the element whose open tag ends at `open_end`, counting nested spans
fn span_close(html: &str, open_end: usize) -> usize {
    let mut depth = 0usize;
    for caps in SPAN_TAG.captures_iter(&html[open_end..]) {
        let m = caps.get(0).map_or(0..0, |m| m.range());
        if caps[1].is_empty() {
            depth += 1;
        } else if depth == 0 {
            return open_end + m.end;
        } else {
            depth -= 1;
        }
    }
    open_end
}

/// Every placeholder span in document order, whatever the attribute order
pub fn find_placeholders(html: &str) -> Vec<PlaceholderSpan> {
    SPAN_OPEN
        .find_iter(html)
        .filter_map(|open| {
            let tag = open.as_str();
            if !PLACEHOLDER_CLASS.is_match(tag) {
                return None;
            }
            let caps = BASENAME_ATTR.captures(tag)?;
            let basename = caps.get(1).or_else(|| caps.get(2))?.as_str().trim().to_string();
            if basename.is_empty() {
                return None;
            }
            Some(PlaceholderSpan {
                basename,
                start: open.start(),
                end: span_close(html, open.end()),
            })
        })
        .collect()
}

/// Byte range of the nearest element enclosing `start..end`
fn enclosing_element(html: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let mut stack: Vec<(String, usize)> = Vec::new();

    for caps in ANY_TAG.captures_iter(&html[..start]) {
        let name = caps[2].to_ascii_lowercase();
        let tag_start = caps.get(0).map_or(0, |m| m.start());
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();

        if closing {
            if let Some(pos) = stack.iter().rposition(|(n, _)| *n == name) {
                stack.truncate(pos);
            }
        } else if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
            stack.push((name, tag_start));
        }
    }

    let (name, open_start) = stack.pop()?;
    if STRIP_BARRIERS.contains(&name.as_str()) {
        return None;
    }

    let mut depth = 0usize;
    for caps in ANY_TAG.captures_iter(&html[end..]) {
        if !caps[2].eq_ignore_ascii_case(&name) {
            continue;
        }
        let tag_end = caps.get(0).map_or(0, |m| m.end());
        if caps[1].is_empty() {
            if caps[3].is_empty() {
                depth += 1;
            }
        } else if depth == 0 {
            return Some((open_start, end + tag_end));
        } else {
            depth -= 1;
        }
    }

    None
}

fn push_unique(list: &mut Vec<String>, basename: &str) {
    if !list.iter().any(|b| b == basename) {
        list.push(basename.to_string());
    }
}

/// Apply `rules` to `html`.
///
/// Strip placeholders take their nearest enclosing element with them (just
/// the span when no element encloses it), replace placeholders become the
/// escaped context value, ignore placeholders stay for the delivery step.
pub fn process(html: &str, rules: &RuleTable, context: &PlaceholderContext) -> PlaceholderOutcome {
    let spans = find_placeholders(html);

    // Pass 1: classify every distinct basename
    let mut rejected = Vec::new();
    let mut processed = Processed::default();
    let mut seen: Vec<String> = Vec::new();

    for span in &spans {
        let key = rules.case().normalize(&span.basename);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        match rules.classify(&span.basename) {
            RuleCategory::Reject => rejected.push(span.basename.clone()),
            RuleCategory::Replace if context.value_for(&span.basename, rules).is_none() => {
                rejected.push(span.basename.clone())
            }
            RuleCategory::Replace => push_unique(&mut processed.replaced, &span.basename),
            RuleCategory::Strip => push_unique(&mut processed.stripped, &span.basename),
            RuleCategory::Ignore => push_unique(&mut processed.ignored, &span.basename),
        }
    }

    if !rejected.is_empty() {
        info!(policy = rules.name(), rejected = ?rejected, "Placeholders rejected; document left untouched");
        return PlaceholderOutcome {
            success: false,
            html: html.to_string(),
            rejected,
            processed: Processed::default(),
        };
    }

    // Pass 2: mutate, rescanning after each edit since offsets shift
    let mut out = html.to_string();
    for _ in 0..=spans.len() {
        let next = find_placeholders(&out).into_iter().find_map(|span| {
            match rules.classify(&span.basename) {
                RuleCategory::Strip => Some((span, None)),
                RuleCategory::Replace => {
                    let value = context.value_for(&span.basename, rules)?;
                    Some((span, Some(html_escape::encode_text(value).into_owned())))
                }
                _ => None,
            }
        });

        let Some((span, replacement)) = next else {
            break;
        };

        out = match replacement {
            Some(text) => format!("{}{}{}", &out[..span.start], text, &out[span.end..]),
            None => {
                let (start, end) =
                    enclosing_element(&out, span.start, span.end).unwrap_or((span.start, span.end));
                format!("{}{}", &out[..start], &out[end..])
            }
        };
    }

    debug!(
        policy = rules.name(),
        ignored = processed.ignored.len(),
        stripped = processed.stripped.len(),
        replaced = processed.replaced.len(),
        "Placeholders processed"
    );

    PlaceholderOutcome {
        success: true,
        html: out,
        rejected,
        processed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::PolicySet;

    fn email_rules() -> RuleTable {
        PolicySet::builtin().unwrap().get("email").unwrap().clone()
    }

    #[test]
    fn test_find_placeholders_either_attribute_order() {
        let html = r#"<span class="placeholder" data-basename="A">a</span> <span data-basename='B' class="x placeholder">b</span> <span class="other" data-basename="C">c</span>"#;
        let spans = find_placeholders(html);

        let names: Vec<_> = spans.iter().map(|s| s.basename.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(&html[spans[0].start..spans[0].end], r#"<span class="placeholder" data-basename="A">a</span>"#);
    }

    #[test]
    fn test_nested_span_inside_placeholder() {
        let html = r#"<span class="placeholder" data-basename="A"><span>[A]</span></span>tail"#;
        let spans = find_placeholders(html);
        assert_eq!(&html[spans[0].end..], "tail");
    }

    #[test]
    fn test_rejected_basename_aborts_without_mutation() {
        let html = r#"<p>Hi <span class="placeholder" data-basename="FIRST_NAME">[First]</span></p><div><span class="placeholder" data-basename="COMPANY_NAME">Acme</span></div>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());

        assert!(!outcome.success);
        assert_eq!(outcome.rejected, vec!["FIRST_NAME"]);
        assert_eq!(outcome.html, html);
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_strip_removes_enclosing_element() {
        let html = r#"<p>Keep</p><div><span class="placeholder" data-basename="COMPANY_NAME">[Company]</span></div><p>Also</p>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());

        assert!(outcome.success);
        assert_eq!(outcome.html, "<p>Keep</p><p>Also</p>");
        assert_eq!(outcome.processed.stripped, vec!["COMPANY_NAME"]);
    }

    #[test]
    fn test_strip_picks_nearest_element() {
        let html = r#"<table><tr><td>Logo: <b><span class="placeholder" data-basename="COMPANY_LOGO">x</span></b> <br> end</td></tr></table>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());
        assert_eq!(outcome.html, "<table><tr><td>Logo:  <br> end</td></tr></table>");
    }

    #[test]
    fn test_strip_directly_in_body_removes_only_span() {
        let html = r#"<body>Hello <span class="placeholder" data-basename="COMPANY_NAME">x</span> there</body>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());
        assert_eq!(outcome.html, "<body>Hello  there</body>");
    }

    #[test]
    fn test_replace_escapes_value() {
        let html = r#"<p>From: <span class="placeholder" data-basename="FROM_FRIENDLY_NAME">[From]</span></p>"#;

        let ctx = PlaceholderContext::new().with_from_name("Acme IT");
        let outcome = process(html, &email_rules(), &ctx);
        assert_eq!(outcome.html, "<p>From: Acme IT</p>");
        assert_eq!(outcome.processed.replaced, vec!["FROM_FRIENDLY_NAME"]);

        let ctx = PlaceholderContext::new().with_from_name("R&D <Ops>");
        let outcome = process(html, &email_rules(), &ctx);
        assert_eq!(outcome.html, "<p>From: R&amp;D &lt;Ops&gt;</p>");
    }

    #[test]
    fn test_replace_without_value_is_rejected() {
        let html = r#"<span class="placeholder" data-basename="FROM_FRIENDLY_NAME">x</span>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());
        assert!(!outcome.success);
        assert_eq!(outcome.rejected, vec!["FROM_FRIENDLY_NAME"]);
    }

    #[test]
    fn test_ignored_placeholders_survive() {
        let html = r##"<a href="#"><span class="placeholder" data-basename="phishing_url">link</span></a>"##;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());

        assert!(outcome.success);
        assert_eq!(outcome.html, html);
        assert_eq!(outcome.processed.ignored, vec!["phishing_url"]);
    }

    #[test]
    fn test_repeated_strip_placeholders() {
        let html = r#"<div><span class="placeholder" data-basename="COMPANY_NAME">a</span></div><p>x</p><div><span class="placeholder" data-basename="COMPANY_NAME">b</span></div>"#;
        let outcome = process(html, &email_rules(), &PlaceholderContext::new());
        assert_eq!(outcome.html, "<p>x</p>");
        assert_eq!(outcome.processed.stripped.len(), 1);
    }
}
