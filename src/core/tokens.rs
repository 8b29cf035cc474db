//! Opaque placeholder tokens for external round-trips.
//!
//! A `TokenMap` hands out tokens of the form `__LFREF_000001__` (asset
//! references) or `__LFBLOCK_000001__` (protected blocks) and remembers the
//! original value behind each one. The prefixes are reserved: the counter of a
//! new map starts above any token number already present in the document, so a
//! document that happens to contain token-like text still round-trips.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

/// Group 1 is the whole token, group 2 its number
static REF_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(__LFREF_([0-9]{6,})__)").expect("REF_TOKEN regex is valid"));

static BLOCK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(__LFBLOCK_([0-9]{6,})__)").expect("BLOCK_TOKEN regex is valid"));

/// Matches a block token together with the comment wrapping it, if still present
static BLOCK_TOKEN_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<!--\s*)?(__LFBLOCK_[0-9]{6,}__)(?:\s*-->)?")
        .expect("BLOCK_TOKEN_COMMENT regex is valid")
});

static REF_TOKEN_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__LFREF_[0-9]{6,}__$").expect("REF_TOKEN_EXACT regex is valid"));

/// Digits in a freshly numbered token
const MIN_DIGITS: usize = 6;

/// What a token stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A URL-bearing attribute value or `url()` argument
    AssetReference,

    /// A whole `<script>` element or `<link>` tag
    ProtectedBlock,
}

impl TokenKind {
    fn prefix(&self) -> &'static str {
        match self {
            TokenKind::AssetReference => "__LFREF_",
            TokenKind::ProtectedBlock => "__LFBLOCK_",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            TokenKind::AssetReference => &REF_TOKEN,
            TokenKind::ProtectedBlock => &BLOCK_TOKEN,
        }
    }
}

/// Whether `value` is exactly one asset-reference token
pub fn is_reference_token(value: &str) -> bool {
    REF_TOKEN_EXACT.is_match(value.trim())
}

/// Whether `value` contains an asset-reference token anywhere
pub fn contains_reference_token(value: &str) -> bool {
    REF_TOKEN.is_match(value)
}

/// Ordered mapping from issued token to original value.
///
/// Created at the start of a protect/tokenize pass and consumed by the
/// matching restore pass.
#[derive(Debug, Clone)]
pub struct TokenMap {
    kind: TokenKind,
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
    next: u64,
    /// Zero-padded width of issued numbers
    digits: usize,
    /// Longest number seen in the document or issued so far
    longest: usize,
}

impl TokenMap {
    /// Empty map whose counter starts above every token already in `document`.
    ///
    /// When the existing numbers leave no room in `u64`, issued tokens are
    /// widened past the longest existing number instead, so they still cannot
    /// equal any literal in the document.
    pub fn for_document(kind: TokenKind, document: &str) -> Self {
        let mut highest: Option<u64> = None;
        let mut longest = 0;
        let mut exhausted = false;

        for caps in kind.pattern().captures_iter(document) {
            let number = &caps[2];
            longest = longest.max(number.len());
            match number.parse::<u64>() {
                Ok(n) if n < u64::MAX => highest = highest.max(Some(n)),
                _ => exhausted = true,
            }
        }

        let (next, digits) = match highest {
            _ if exhausted => (1, longest + 1),
            Some(h) => (h + 1, MIN_DIGITS),
            None => (1, MIN_DIGITS),
        };

        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
            next,
            digits,
            longest,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Issue a fresh token for `original`
    pub fn issue(&mut self, original: &str) -> String {
        let number = format!("{:0width$}", self.next, width = self.digits);
        self.longest = self.longest.max(number.len());
        let token = format!("{}{}__", self.kind.prefix(), number);

        match self.next.checked_add(1) {
            Some(next) => self.next = next,
            None => {
                self.next = 1;
                self.digits = self.longest + 1;
            }
        }

        self.index.insert(token.clone(), self.entries.len());
        self.entries.push((token.clone(), original.to_string()));
        token
    }

    /// Original value behind a token
    pub fn get(&self, token: &str) -> Option<&str> {
        self.index.get(token).map(|&i| self.entries[i].1.as_str())
    }

    /// Tokens and originals in issue order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, o)| (t.as_str(), o.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Issued tokens that no longer occur in `html`
    pub fn missing_in<'a>(&'a self, html: &str) -> Vec<&'a str> {
        self.entries
            .iter()
            .map(|(t, _)| t.as_str())
            .filter(|t| !html.contains(t))
            .collect()
    }

    /// Substitute every issued token in `html` back to its original value.
    ///
    /// Single pass: restored values are never rescanned, and token-like text
    /// this map did not issue is left alone. Tokens dropped by an external
    /// rewrite cannot be restored; they are logged and skipped.
    pub fn restore(&self, html: &str) -> String {
        if self.entries.is_empty() {
            return html.to_string();
        }

        let missing = self.missing_in(html);
        if !missing.is_empty() {
            warn!(
                kind = ?self.kind,
                missing = missing.len(),
                issued = self.entries.len(),
                first_missing = missing[0],
                "Tokens lost before restore; their original values cannot be put back"
            );
        }

        let pattern: &Regex = match self.kind {
            TokenKind::AssetReference => &REF_TOKEN,
            TokenKind::ProtectedBlock => &BLOCK_TOKEN_COMMENT,
        };

        pattern
            .replace_all(html, |caps: &Captures| {
                match self.get(&caps[1]) {
                    Some(original) => original.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_is_sequential_and_padded() {
        let mut map = TokenMap::for_document(TokenKind::AssetReference, "<p>plain</p>");
        assert_eq!(map.issue("a.png"), "__LFREF_000001__");
        assert_eq!(map.issue("b.png"), "__LFREF_000002__");
        assert_eq!(map.get("__LFREF_000002__"), Some("b.png"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_counter_skips_existing_tokens() {
        let doc = "<p>__LFREF_000041__ is literal text</p>";
        let mut map = TokenMap::for_document(TokenKind::AssetReference, doc);
        assert_eq!(map.issue("x"), "__LFREF_000042__");

        // Block tokens use their own counter
        let mut blocks = TokenMap::for_document(TokenKind::ProtectedBlock, doc);
        assert_eq!(blocks.issue("<link>"), "__LFBLOCK_000001__");
    }

    #[test]
    fn test_restore_leaves_foreign_tokens() {
        let doc = "__LFREF_000007__ and ";
        let mut map = TokenMap::for_document(TokenKind::AssetReference, doc);
        let token = map.issue("logo.png");
        let tokenized = format!("{}{}", doc, token);

        assert_eq!(map.restore(&tokenized), "__LFREF_000007__ and logo.png");
    }

    #[test]
    fn test_restore_reports_missing() {
        let mut map = TokenMap::for_document(TokenKind::AssetReference, "");
        let kept = map.issue("kept.png");
        let lost = map.issue("lost.png");

        let html = format!("<img src=\"{}\">", kept);
        assert_eq!(map.missing_in(&html), vec![lost.as_str()]);
        assert_eq!(map.restore(&html), "<img src=\"kept.png\">");
    }

    #[test]
    fn test_block_restore_accepts_unwrapped_token() {
        let mut map = TokenMap::for_document(TokenKind::ProtectedBlock, "");
        let token = map.issue("<script>go()</script>");

        assert_eq!(map.restore(&format!("<!--{}-->", token)), "<script>go()</script>");
        // A rewriter that dropped the comment markers still gets the block back
        assert_eq!(map.restore(&format!("<p>{}</p>", token)), "<p><script>go()</script></p>");
    }

    #[test]
    fn test_restore_puts_references_back() {
        let mut map = TokenMap::for_document(TokenKind::AssetReference, "");
        let token = map.issue("a.png");

        assert_eq!(map.restore(&format!(r#"<img src="{}">"#, token)), r#"<img src="a.png">"#);
    }

    #[test]
    fn test_exhausted_counter_widens_tokens() {
        let doc = "<p>__LFREF_18446744073709551615__</p>";
        let mut map = TokenMap::for_document(TokenKind::AssetReference, doc);

        let token = map.issue("a.png");
        assert_eq!(token, "__LFREF_000000000000000000001__");
        assert!(!doc.contains(&token));

        let tokenized = format!("{}{}", doc, token);
        assert_eq!(map.restore(&tokenized), "<p>__LFREF_18446744073709551615__</p>a.png");
    }

    #[test]
    fn test_counter_widens_when_issuing_past_max() {
        let doc = "__LFBLOCK_18446744073709551614__";
        let mut map = TokenMap::for_document(TokenKind::ProtectedBlock, doc);

        assert_eq!(map.issue("<link>"), "__LFBLOCK_18446744073709551615__");
        assert_eq!(map.issue("<script></script>"), "__LFBLOCK_000000000000000000001__");
        assert_eq!(map.get("__LFBLOCK_000000000000000000001__"), Some("<script></script>"));
    }

    #[test]
    fn test_contains_reference_token() {
        assert!(contains_reference_token("a src=__LFREF_000001__"));
        assert!(!contains_reference_token("a src=b.png"));
    }

    #[test]
    fn test_is_reference_token() {
        assert!(is_reference_token("__LFREF_000001__"));
        assert!(is_reference_token(" __LFREF_1234567__ "));
        assert!(!is_reference_token("__LFREF_01__"));
        assert!(!is_reference_token("images/__LFREF_000001__.png"));
    }
}
