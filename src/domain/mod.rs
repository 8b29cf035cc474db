//! Domain types for the lureforge import pipeline.
//!
//! This module contains the core data structures:
//! - Artifact: The stored, deliverable form of an imported content item
//! - Events: Immutable records of import progress
//! - Tags: Controlled vocabulary and difficulty levels

pub mod artifact;
pub mod events;
pub mod tags;

// Re-export commonly used types
pub use artifact::{ContentArtifact, ContentKind};
pub use events::{ImportEvent, ImportEventType, Stage};
pub use tags::{Difficulty, Tag, TagSet};
