//! Error taxonomy for the ingestion core.
//!
//! Provider exhaustion and network failures are not errors here: they are
//! reported as `PassOutcome` values. Only failures that affect durability
//! (persistence) reach the caller of a trigger.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("persisting {category} batch failed: {source:#}")]
    Persistence {
        category: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("full refresh failed for categories: {}", failed.join(", "))]
    Refresh { failed: Vec<String> },
}

impl IngestError {
    /// Category the error belongs to, if it is tied to a single pass.
    pub fn category(&self) -> Option<&str> {
        match self {
            IngestError::Persistence { category, .. } => Some(category),
            IngestError::Refresh { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
