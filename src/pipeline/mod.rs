//! Email ingestion pipeline.
//!
//! Connects a [`MailSource`] to an [`EmailStore`] through the triage
//! orchestrator: fetch new mail, classify each message, and persist
//! everything worth keeping as a pending [`EmailRecord`].

pub mod ingest;
pub mod jsonl;
pub mod types;

pub use ingest::{spawn_ingest_loop, IngestPipeline, IngestSummary};
pub use jsonl::{JsonlSource, JsonlStore};
pub use types::{
    EmailCategory, EmailMessage, EmailRecord, EmailStore, MailSource, ProcessingStatus,
};
