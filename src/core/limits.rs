//! Import limits and enforcement.
//!
//! Guards the pipeline against inputs it should not process:
//! - Oversized documents
//! - Rewriter chunk size
//! - Suspicious rewriter output sizes (truncation, runaway generation)
//! - Archive entries that are packaging debris

use std::time::Instant;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::ImportError;

/// Limits applied to a single import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLimits {
    /// Largest piece of HTML sent to the rewriter in one call (default: 12KB)
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Output/input size ratio below which a rewrite looks truncated
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    /// Output/input size ratio above which a rewrite looks inflated
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,

    /// Maximum entry document size in bytes (default: 10MB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Archive entries matching these globs are not extracted
    #[serde(default = "default_archive_denylist")]
    pub archive_denylist: Vec<String>,
}

fn default_max_chunk_bytes() -> usize {
    12 * 1024
}
fn default_min_ratio() -> f64 {
    0.5
}
fn default_max_ratio() -> f64 {
    2.0
}
fn default_max_input_bytes() -> u64 {
    10 * 1024 * 1024
} // 10MB

fn default_archive_denylist() -> Vec<String> {
    vec![
        "__MACOSX/**".to_string(),
        "**/.DS_Store".to_string(),
        "**/Thumbs.db".to_string(),
    ]
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
            min_ratio: default_min_ratio(),
            max_ratio: default_max_ratio(),
            max_input_bytes: default_max_input_bytes(),
            archive_denylist: default_archive_denylist(),
        }
    }
}

impl ImportLimits {
    /// Check if an archive entry matches any denylist pattern
    pub fn is_denylisted(&self, entry: &str) -> bool {
        // "**/" does not match at the archive root, so try the bare name too
        let root_form = format!("./{}", entry);
        self.archive_denylist
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches(entry) || pattern.matches(&root_form))
    }

    /// Validate a document against the size limit
    pub fn validate_input(&self, input: &str) -> Result<(), LimitViolation> {
        let size = input.len() as u64;
        if size > self.max_input_bytes {
            return Err(LimitViolation::MaxInputBytes {
                actual: size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Flag rewriter output whose size is out of band with its input
    pub fn check_ratio(&self, input_bytes: usize, output_bytes: usize) -> Result<(), LimitViolation> {
        if input_bytes == 0 {
            return Ok(());
        }

        let ratio = output_bytes as f64 / input_bytes as f64;
        if ratio < self.min_ratio || ratio > self.max_ratio {
            return Err(LimitViolation::RatioAnomaly {
                ratio,
                min: self.min_ratio,
                max: self.max_ratio,
            });
        }
        Ok(())
    }
}

/// Tracks rewriter usage during an import
#[derive(Debug, Clone)]
pub struct RewriteTracker {
    /// Number of rewriter calls made
    pub calls: u32,

    /// Calls whose output was discarded
    pub degraded: u32,

    pub input_bytes: u64,
    pub output_bytes: u64,

    pub started_at: Instant,
}

impl Default for RewriteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteTracker {
    pub fn new() -> Self {
        Self {
            calls: 0,
            degraded: 0,
            input_bytes: 0,
            output_bytes: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one rewriter call
    pub fn record_call(&mut self, input_bytes: usize, output_bytes: usize) {
        self.calls += 1;
        self.input_bytes += input_bytes as u64;
        self.output_bytes += output_bytes as u64;
    }

    pub fn record_degraded(&mut self) {
        self.degraded += 1;
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Limit violation errors
#[derive(Debug, Clone, Error)]
pub enum LimitViolation {
    #[error("Maximum input bytes exceeded: {actual} > {limit}")]
    MaxInputBytes { actual: u64, limit: u64 },

    #[error("Rewrite size ratio {ratio:.2} outside [{min}, {max}]")]
    RatioAnomaly { ratio: f64, min: f64, max: f64 },
}

impl From<LimitViolation> for ImportError {
    fn from(violation: LimitViolation) -> Self {
        ImportError::validation("import limit exceeded", vec![violation.to_string()])
    }
}
