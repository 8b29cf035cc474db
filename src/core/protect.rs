//! Sensitive-block protection.
//!
//! Replaces every `<script>...</script>` element and every `<link>` tag with a
//! single comment-wrapped token before the document goes to an external
//! rewriter, and puts the original markup back afterwards.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::tokens::{TokenKind, TokenMap};

/// One alternation so each block is found in a single pass over the original
/// document; script bodies are never rescanned for nested blocks.
static SENSITIVE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<link\b[^>]*>")
        .expect("SENSITIVE_BLOCK regex is valid")
});

/// Document with its sensitive blocks swapped for tokens
#[derive(Debug, Clone)]
pub struct Protected {
    pub html: String,
    pub blocks: TokenMap,
}

/// Replace scripts and link tags with `<!--__LFBLOCK_nnnnnn__-->` comments
pub fn protect(html: &str) -> Protected {
    let mut blocks = TokenMap::for_document(TokenKind::ProtectedBlock, html);

    let protected = SENSITIVE_BLOCK
        .replace_all(html, |caps: &regex::Captures| {
            let token = blocks.issue(&caps[0]);
            format!("<!--{}-->", token)
        })
        .into_owned();

    debug!(
        blocks = blocks.len(),
        input_bytes = html.len(),
        output_bytes = protected.len(),
        "Protected sensitive blocks"
    );

    Protected {
        html: protected,
        blocks,
    }
}

/// Put protected blocks back. Tokens lost in between stay lost (logged).
pub fn restore(html: &str, blocks: &TokenMap) -> String {
    blocks.restore(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_and_links_are_replaced() {
        let html = r#"<head><link rel="stylesheet" href="a.css"><script src="x.js"></script></head><p>Hi</p><SCRIPT type="text/javascript">if (a < b) { go(); }</SCRIPT>"#;

        let protected = protect(html);

        assert_eq!(protected.blocks.len(), 3);
        assert!(!protected.html.contains("<script"));
        assert!(!protected.html.contains("<SCRIPT"));
        assert!(!protected.html.contains("<link"));
        assert!(protected.html.contains("<p>Hi</p>"));
        assert!(protected.html.starts_with("<head><!--__LFBLOCK_000001__--><!--__LFBLOCK_000002__--></head>"));
    }

    #[test]
    fn test_restore_roundtrip() {
        let html = "<script>\nvar s = '<link rel=x>';\n</script><link href=\"b.css\"/>text";
        let protected = protect(html);

        // The link inside the script is part of the script block, not a second block
        assert_eq!(protected.blocks.len(), 2);
        assert_eq!(restore(&protected.html, &protected.blocks), html);
    }

    #[test]
    fn test_unterminated_script_is_left_alone() {
        let html = "<p>before</p><script>never closed";
        let protected = protect(html);
        assert!(protected.blocks.is_empty());
        assert_eq!(protected.html, html);
    }

    #[test]
    fn test_dropped_token_stays_dropped() {
        let html = "<p>a</p><script>x()</script><p>b</p><script>y()</script>";
        let protected = protect(html);

        // Simulate a rewriter that truncated the tail of the document
        let cut = protected.html.find("<p>b</p>").unwrap();
        let truncated = &protected.html[..cut];

        assert_eq!(restore(truncated, &protected.blocks), "<p>a</p><script>x()</script>");
    }
}
