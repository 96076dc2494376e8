// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod quota;
pub mod store;

pub use crate::api::router;
pub use crate::error::IngestError;
pub use crate::ingest::{IngestionOrchestrator, PassOutcome, PassReport};
pub use crate::quota::QuotaAllocator;
