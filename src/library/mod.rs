//! Content library for imported artifacts.
//!
//! The library stores extracted packages and rewritten documents in one
//! directory per content item, plus a catalog of finished artifacts.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.lureforge/
//! ├── catalog.json              # Index of all imported artifacts
//! ├── imports/<content_id>/     # Import journal (events.jsonl)
//! └── library/
//!     └── <content_id>/         # SHA256(upload)[0:16]
//!         ├── index.html        # Entry document (package / landing page)
//!         ├── email.html        # Entry document (email)
//!         ├── system/, images/  # Localized legacy assets
//!         └── cdn/<host>/...    # Localized CDN assets
//! ```

pub mod catalog;
pub mod content;

pub use catalog::Catalog;
pub use content::{ContentDir, ContentId};
