//! Property tests for the markup round-trips and the chunker.
//!
//! Documents are built from fragments that exercise every tokenized and
//! protected construct, mixed with prose and token-like text.

use lureforge::core::chunker::{reassemble, split};
use lureforge::core::protect::{protect, restore};
use lureforge::core::tokenize::{detokenize, tokenize};
use proptest::prelude::*;

fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ,.!]{0,30}",
        "[a-z]{1,8}".prop_map(|p| format!("<p>{}</p>", p)),
        "[a-z/]{1,12}".prop_map(|src| format!(r#"<img src="/system/{}.png">"#, src)),
        "[a-z]{1,8}".prop_map(|href| format!("<a href='{}.html'>link</a>", href)),
        "[a-z]{1,8}".prop_map(|href| format!("<a href={}>bare</a>", href)),
        "[a-z]{1,8}".prop_map(|bg| format!(r#"<div style="background: url('/images/{}.jpg')">x</div>"#, bg)),
        "[a-z]{1,8}".prop_map(|bg| format!("<style>.a {{ background: url({}.gif); }}</style>", bg)),
        "[a-z]{1,8}".prop_map(|f| format!(r#"<style>i{{background:url("a src={}.png")}}</style>"#, f)),
        "[a-z]{1,8}".prop_map(|f| format!(r#"<p style="x:url('c href={}.gif')">y</p>"#, f)),
        "[a-z (); =]{0,20}".prop_map(|code| format!("<script>{}</script>", code)),
        "[a-z]{1,8}".prop_map(|href| format!(r#"<link rel="stylesheet" href="{}.css">"#, href)),
        Just(r#"<a href="mailto:it@example.com">mail</a>"#.to_string()),
        (0u32..100).prop_map(|n| format!("__LFREF_{:06}__", n)),
        (0u32..100).prop_map(|n| format!("__LFBLOCK_{:06}__", n)),
    ]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..24).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn tokenize_round_trips(doc in document()) {
        let tokenized = tokenize(&doc);
        prop_assert_eq!(detokenize(&tokenized.html, &tokenized.references), doc);
    }

    #[test]
    fn protect_round_trips(doc in document()) {
        let protected = protect(&doc);
        prop_assert!(!protected.html.contains("<script"));
        prop_assert_eq!(restore(&protected.html, &protected.blocks), doc);
    }

    #[test]
    fn protect_then_tokenize_round_trips(doc in document()) {
        let protected = protect(&doc);
        let tokenized = tokenize(&protected.html);

        let restored = restore(&detokenize(&tokenized.html, &tokenized.references), &protected.blocks);
        prop_assert_eq!(restored, doc);
    }

    #[test]
    fn tokenizing_twice_issues_nothing_new(doc in document()) {
        let once = tokenize(&doc);
        let twice = tokenize(&once.html);

        prop_assert!(twice.references.is_empty());
        prop_assert_eq!(twice.html, once.html);
    }

    #[test]
    fn chunks_reassemble_to_original(doc in document(), max_size in 1usize..200) {
        let chunks = split(&doc, max_size);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

        prop_assert_eq!(reassemble(&contents), doc.clone());

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(chunk.content.len() <= max_size);
            prop_assert_eq!(&doc[chunk.offset..chunk.offset + chunk.content.len()], chunk.content.as_str());
        }
    }

    #[test]
    fn chunks_handle_multibyte_text(text in "[a-zé日本 <>/p]{0,120}", max_size in 1usize..16) {
        let chunks = split(&text, max_size);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        prop_assert_eq!(reassemble(&contents), text);
    }
}
