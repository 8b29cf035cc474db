//! Safe-boundary chunking for size-limited rewriters.
//!
//! Oversized documents are cut right after a closing tag so every chunk can be
//! rewritten on its own. Concatenating the chunks in order gives back the
//! original document byte for byte.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static CLOSING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</([A-Za-z][A-Za-z0-9]*)\s*>").expect("CLOSING_TAG regex is valid")
});

/// Placeholder tokens, which a cut must never split
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__LF(?:REF|BLOCK)_[0-9]+__").expect("TOKEN regex is valid")
});

/// Longest token worth looking back for around a cut
const TOKEN_REACH: usize = 64;

/// Block-level elements preferred as cut points
const PREFERRED_TAGS: &[&str] = &[
    "p", "div", "table", "tr", "li", "ul", "ol", "section", "article", "header", "footer",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "td", "center", "form", "nav", "aside",
];

/// One contiguous piece of a larger document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlChunk {
    /// Position in the chunk sequence
    pub index: usize,

    /// Byte offset of the chunk in the original document
    pub offset: usize,

    pub content: String,
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

/// Length of the chunk to cut from the front of `window`
fn cut_length(window: &str) -> Option<usize> {
    let mut last_preferred = None;
    let mut last_any = None;

    for caps in CLOSING_TAG.captures_iter(window) {
        let end = caps.get(0).map_or(0, |m| m.end());
        last_any = Some(end);

        let name = caps[1].to_ascii_lowercase();
        if PREFERRED_TAGS.contains(&name.as_str()) {
            last_preferred = Some(end);
        }
    }

    last_preferred.or(last_any)
}

/// Move a cut at `end` back to the start of any token it would split.
///
/// A token longer than the whole window is cut anyway.
fn token_safe_cut(rest: &str, end: usize) -> usize {
    let from = floor_char_boundary(rest, end.saturating_sub(TOKEN_REACH));
    let to = ceil_char_boundary(rest, (end + TOKEN_REACH).min(rest.len()));

    TOKEN
        .find_iter(&rest[from..to])
        .map(|m| (from + m.start(), from + m.end()))
        .find(|&(start, stop)| start < end && end < stop)
        .map_or(end, |(start, _)| if start > 0 { start } else { end })
}

/// Split `html` into chunks of at most `max_size` bytes.
///
/// A chunk only exceeds `max_size` when a single character is wider than the
/// limit. Windows without any closing tag are cut at the limit, which may land
/// inside a tag but backs off to keep placeholder tokens whole.
pub fn split(html: &str, max_size: usize) -> Vec<HtmlChunk> {
    let max_size = max_size.max(1);

    if html.len() <= max_size {
        return vec![HtmlChunk {
            index: 0,
            offset: 0,
            content: html.to_string(),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < html.len() {
        let rest = &html[start..];

        let len = if rest.len() <= max_size {
            rest.len()
        } else {
            let window_end = floor_char_boundary(rest, max_size);
            let window = &rest[..window_end];

            match cut_length(window) {
                Some(len) if len > 0 => len,
                _ if window_end > 0 => token_safe_cut(rest, window_end),
                // A character wider than the limit
                _ => ceil_char_boundary(rest, 1),
            }
        };

        chunks.push(HtmlChunk {
            index: chunks.len(),
            offset: start,
            content: rest[..len].to_string(),
        });
        start += len;
    }

    chunks
}

/// Concatenate chunks (rewritten or not) in their original order
pub fn reassemble<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks.iter().map(|c| c.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_input_is_single_chunk() {
        let chunks = split("<p>short</p>", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "<p>short</p>");
    }

    #[test]
    fn test_fallback_cut_keeps_tokens_whole() {
        let html = "plain text __LFREF_000001__ more text __LFBLOCK_000002__ end";
        let chunks = split(html, 20);

        for chunk in &chunks {
            assert!(chunk.content.len() <= 20);
            let partial = chunk.content.matches("__LF").count();
            let whole = TOKEN.find_iter(&chunk.content).count();
            assert_eq!(partial, whole, "split token in {:?}", chunk.content);
        }
        // Both cuts that would land inside a token move back to its start
        assert_eq!(chunks[0].content, "plain text ");
        assert_eq!(chunks[2].content, "e text ");

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(reassemble(&contents), html);
    }

    #[test]
    fn test_prefers_block_closing_tags() {
        let html = "<p>one <b>bold</b> text</p><p>two <i>it</i></p><p>three</p>";
        let chunks = split(html, 40);

        // The first window holds "</b>" and "</p>"; the block tag wins
        assert_eq!(chunks[0].content, "<p>one <b>bold</b> text</p>");
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, html);
    }

    #[test]
    fn test_falls_back_to_any_closing_tag() {
        let html = "<span>a</span><span>b</span><span>c</span>";
        let chunks = split(html, 20);
        assert_eq!(chunks[0].content, "<span>a</span>");
    }

    #[test]
    fn test_no_closing_tag_cuts_at_limit() {
        let html = "x".repeat(25);
        let chunks = split(&html, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 10);
        assert_eq!(chunks[2].offset, 20);
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let html = "é".repeat(10); // 2 bytes each
        let chunks = split(&html, 3);
        assert!(chunks.iter().all(|c| c.content == "é"));
        assert_eq!(reassemble(&chunks.iter().map(|c| c.content.clone()).collect::<Vec<_>>()), html);
    }

    #[test]
    fn test_limit_smaller_than_character() {
        let html = "€€"; // 3 bytes each
        let chunks = split(html, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "€");
    }
}
