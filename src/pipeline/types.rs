//! Shared types for the ingestion pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::triage::{Category, Classification};

// ── Inbound email ───────────────────────────────────────────────────

/// One inbound email, as handed over by a mail source.
///
/// Absent subjects are tolerated throughout; classification treats them as
/// empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Message-ID (or a generated UUID when the source had none).
    pub id: String,
    /// Sender as given: an address or "Name <addr>". Not validated.
    pub sender: String,
    /// Subject line, if any.
    pub subject: Option<String>,
    /// Plain-text body.
    pub body: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

// ── Persisted record ────────────────────────────────────────────────

/// Persisted category — triage's three values plus the human-only `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCategory {
    Ignore,
    Notify,
    Respond,
    Done,
}

impl From<Category> for EmailCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Ignore => Self::Ignore,
            Category::Notify => Self::Notify,
            Category::Respond => Self::Respond,
        }
    }
}

/// Embedding/indexing lifecycle of a stored email. Advances monotonically:
/// pending → processing → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

/// An email record as it is persisted: the message plus triage outcome.
///
/// Category is set once by triage; `done` is only reachable through
/// [`EmailRecord::mark_done`], a human action in the review UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    #[serde(flatten)]
    pub message: EmailMessage,
    pub category: EmailCategory,
    pub triage_reasoning: String,
    pub status: ProcessingStatus,
}

impl EmailRecord {
    /// Build a record from a triage classification, truncating the
    /// reasoning for persistence.
    pub fn from_classification(
        message: EmailMessage,
        classification: &Classification,
        max_reasoning_chars: usize,
    ) -> Self {
        let triage_reasoning: String = classification
            .reasoning
            .chars()
            .take(max_reasoning_chars)
            .collect();
        Self {
            message,
            category: classification.category.into(),
            triage_reasoning,
            status: ProcessingStatus::Pending,
        }
    }

    /// Advance the processing status. Rejects non-monotonic transitions.
    pub fn advance(&mut self, next: ProcessingStatus) -> Result<(), PipelineError> {
        if !self.status.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.status.label().to_string(),
                to: next.label().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Human-only transition: the attorney marks the email handled.
    pub fn mark_done(&mut self) {
        self.category = EmailCategory::Done;
    }
}

// ── Collaborator seams ──────────────────────────────────────────────

/// A source of inbound mail — pure I/O, no business logic.
///
/// IMAP, files, test fixtures: the pipeline doesn't care. Implementations
/// handle dedup hints, decoding, and ID generation at their boundary.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name (for logging).
    fn name(&self) -> &str;

    /// Fetch a batch of inbound messages. Sources may re-report mail they
    /// returned before; the pipeline dedups by message ID.
    async fn fetch_new(&self) -> Result<Vec<EmailMessage>, PipelineError>;
}

/// Persistence for triaged email records — pure I/O, no business logic.
///
/// The pipeline decides what to store (it never stores `ignore` results);
/// the store only answers existence checks and writes records.
#[async_trait]
pub trait EmailStore: Send + Sync {
    /// Whether a record with this message ID already exists.
    async fn contains(&self, message_id: &str) -> Result<bool, PipelineError>;

    /// Persist one record.
    async fn insert(&self, record: EmailRecord) -> Result<(), PipelineError>;
}
