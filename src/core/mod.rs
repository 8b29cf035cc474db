//! Core import pipeline.
//!
//! This module contains:
//! - Protect/Tokenize: round-trips that shield markup from the rewriter
//! - Placeholders/Policy: per-content-type placeholder rules
//! - Chunker: safe-boundary splitting for size-limited rewriters
//! - Localizer: asset download and reference rewriting
//! - Extractor/Scorable: package unpacking and scoring detection
//! - Journal: append-only import events
//! - Orchestrator: sequences all of the above

pub mod chunker;
pub mod error;
pub mod extractor;
pub mod inject;
pub mod journal;
pub mod limits;
pub mod localizer;
pub mod orchestrator;
pub mod placeholders;
pub mod policy;
pub mod preview;
pub mod protect;
pub mod scorable;
pub mod tokenize;
pub mod tokens;

// Re-export commonly used types
pub use chunker::{reassemble, split, HtmlChunk};
pub use error::{ExtractionError, ImportError};
pub use journal::{ImportStatus, ImportSummary, Journal};
pub use limits::{ImportLimits, LimitViolation, RewriteTracker};
pub use localizer::{is_valid_path, AssetLocalizer, AssetReference, Localized};
pub use orchestrator::{ImportReport, ImportRequest, ImportSettings, Importer};
pub use placeholders::{PlaceholderContext, PlaceholderOutcome, Processed};
pub use policy::{BasenameCase, PolicyError, PolicySet, RuleCategory, RuleTable};
pub use tokens::{TokenKind, TokenMap};
