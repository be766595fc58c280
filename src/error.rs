//! Typed error conditions for the reconciliation stages.
//!
//! Structural errors (a role that cannot be resolved, an ambiguous strict
//! join) abort the stage that raised them. Per-row key failures are carried
//! as [`ReconcileError::KeyFormat`] so lenient callers can exclude and count
//! the row instead of aborting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no column found for role '{role}' (candidates tried: {})", candidates.join(", "))]
    SchemaResolution {
        role: String,
        candidates: Vec<String>,
    },

    #[error("value '{value}' cannot be normalized to an integer code: {reason}")]
    KeyFormat { value: String, reason: String },

    #[error("join key '{key}' matches {matches} right-side rows; use lenient mode to keep the first")]
    AmbiguousJoin { key: String, matches: usize },
}
