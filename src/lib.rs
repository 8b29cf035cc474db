//! lureforge - content import pipeline for phishing-simulation content
//!
//! Takes third-party HTML (emails, landing pages, zipped education packages)
//! and turns it into self-contained, policy-checked artifacts.
//!
//! # Architecture
//!
//! Every import is a sequence of stages recorded in an append-only journal:
//! - Markup is shielded behind opaque tokens before prose is rewritten
//! - Placeholders are checked against a per-content-type rule table
//! - Legacy and CDN assets are downloaded into the content directory
//! - The entry document gets a base URL and, for trackable content, a tracking script
//!
//! # Modules
//!
//! - `adapters`: External system integrations (rewriter, HTTP, storage)
//! - `core`: Import logic (Protect, Tokenize, Chunker, Placeholders, Localizer, Journal)
//! - `domain`: Data structures (Artifact, Event, Tag)
//! - `library`: Content directories and the artifact catalog
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import a landing page
//! lureforge import --kind raw-html page.html
//!
//! # Dry-run the email placeholder policy
//! lureforge check --kind email message.html --from-name "IT Service Desk"
//!
//! # Inspect the journal of an import
//! lureforge status <content-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use core::{ImportError, ImportReport, ImportRequest, Importer};
pub use domain::{ContentArtifact, ContentKind, Difficulty, ImportEvent, ImportEventType, Tag};
pub use library::{Catalog, ContentDir, ContentId};
