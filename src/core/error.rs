//! Error kinds surfaced by the import pipeline.

use thiserror::Error;

/// Errors that abort an import or one of its stages
#[derive(Debug, Error)]
pub enum ImportError {
    /// Rejected placeholders, invalid asset paths. Nothing was mutated.
    #[error("Validation failed ({reason}): {}", .items.join(", "))]
    Validation { reason: String, items: Vec<String> },

    /// The rewriter (or another external service) failed or answered garbage
    #[error("External service '{service}' failed: {message}")]
    ExternalService { service: String, message: String },

    /// Missing entry file or unreadable archive. Fatal for the import.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// An asset fetch failed
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// Writing the artifact, its files or the catalog failed
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Validation error listing every offending item
    pub fn validation(reason: impl Into<String>, items: Vec<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            items,
        }
    }

    /// External service error from any displayable cause
    pub fn external(service: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: format!("{:#}", err),
        }
    }
}

/// Errors raised while unpacking an uploaded archive
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Corrupt or unreadable archive: {0}")]
    CorruptArchive(String),

    #[error("Archive entry escapes the content directory: {0}")]
    UnsafeEntry(String),

    #[error("No entry document found in {0}")]
    MissingEntry(String),

    #[error("Extraction IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_items() {
        let err = ImportError::validation(
            "rejected placeholders",
            vec!["FIRST_NAME".to_string(), "LAST_NAME".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Validation failed (rejected placeholders): FIRST_NAME, LAST_NAME"
        );
    }

    #[test]
    fn test_extraction_converts() {
        let err: ImportError = ExtractionError::MissingEntry("/tmp/x".to_string()).into();
        assert!(matches!(err, ImportError::Extraction(ExtractionError::MissingEntry(_))));
        assert_eq!(err.to_string(), "No entry document found in /tmp/x");
    }
}
