//! JSON Lines source and store — file-backed collaborators.
//!
//! Used by the binary and the test suite. One JSON object per line; the
//! source tolerates malformed lines (logged and skipped) and fills in
//! generated IDs and timestamps the way a mail gateway would.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::types::{EmailMessage, EmailRecord, EmailStore, MailSource};

/// Raw inbound line — every field optional except the body.
#[derive(Debug, Deserialize)]
struct RawEmail {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
}

impl RawEmail {
    fn into_message(self) -> EmailMessage {
        EmailMessage {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("generated-{}", Uuid::new_v4())),
            sender: self.sender,
            subject: self.subject,
            body: self.body,
            received_at: self.received_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Reads an inbox file of JSON Lines emails.
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MailSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn fetch_new(&self) -> Result<Vec<EmailMessage>, PipelineError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PipelineError::Fetch(format!("{}: {e}", self.path.display())))?;

        let mut messages = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEmail>(line) {
                Ok(raw) => messages.push(raw.into_message()),
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "Skipping malformed inbox line");
                }
            }
        }

        debug!(path = %self.path.display(), count = messages.len(), "Read inbox file");
        Ok(messages)
    }
}

/// Appends triaged records to a JSON Lines file.
pub struct JsonlStore {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
}

impl JsonlStore {
    /// Open (or create) the store file, loading existing IDs for dedup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let mut seen = HashSet::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    if let Ok(record) = serde_json::from_str::<EmailRecord>(line) {
                        seen.insert(record.message.id);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::Store(format!("{}: {e}", path.display()))),
        }

        debug!(path = %path.display(), existing = seen.len(), "Opened record store");
        Ok(Self {
            path,
            seen: Mutex::new(seen),
        })
    }
}

#[async_trait]
impl EmailStore for JsonlStore {
    async fn contains(&self, message_id: &str) -> Result<bool, PipelineError> {
        Ok(self
            .seen
            .lock()
            .map_err(|_| PipelineError::Store("ID set poisoned".to_string()))?
            .contains(message_id))
    }

    async fn insert(&self, record: EmailRecord) -> Result<(), PipelineError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|e| PipelineError::Store(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| PipelineError::Store(format!("{}: {e}", self.path.display())))?;

        self.seen
            .lock()
            .map_err(|_| PipelineError::Store("ID set poisoned".to_string()))?
            .insert(record.message.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{EmailCategory, ProcessingStatus};

    fn write_inbox(lines: &[&str]) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn source_reads_well_formed_lines() {
        let inbox = write_inbox(&[
            r#"{"id":"a","sender":"x@y.com","subject":"Hi","body":"hello"}"#,
            r#"{"id":"b","sender":"z@y.com","body":"no subject"}"#,
        ]);
        let source = JsonlSource::new(inbox.path());
        let messages = source.fetch_new().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject.as_deref(), Some("Hi"));
        assert!(messages[1].subject.is_none());
    }

    #[tokio::test]
    async fn source_skips_malformed_lines() {
        let inbox = write_inbox(&[
            r#"{"id":"good","sender":"x@y.com","body":"ok"}"#,
            "not json at all",
            "",
        ]);
        let source = JsonlSource::new(inbox.path());
        let messages = source.fetch_new().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "good");
    }

    #[tokio::test]
    async fn source_generates_missing_ids() {
        let inbox = write_inbox(&[r#"{"sender":"x@y.com","body":"no id"}"#]);
        let source = JsonlSource::new(inbox.path());
        let messages = source.fetch_new().await.unwrap();
        assert!(messages[0].id.starts_with("generated-"));
    }

    #[tokio::test]
    async fn source_errors_on_missing_file() {
        let source = JsonlSource::new("/nonexistent/inbox.jsonl");
        assert!(source.fetch_new().await.is_err());
    }

    #[tokio::test]
    async fn store_roundtrip_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails.jsonl");

        let record = EmailRecord {
            message: EmailMessage {
                id: "r1".into(),
                sender: "client@gmail.com".into(),
                subject: Some("Question".into()),
                body: "Can you help?".into(),
                received_at: Utc::now(),
            },
            category: EmailCategory::Respond,
            triage_reasoning: "direct question".into(),
            status: ProcessingStatus::Pending,
        };

        {
            let store = JsonlStore::open(&path).await.unwrap();
            assert!(!store.contains("r1").await.unwrap());
            store.insert(record.clone()).await.unwrap();
            assert!(store.contains("r1").await.unwrap());
        }

        // Reopen: IDs reload from disk.
        let store = JsonlStore::open(&path).await.unwrap();
        assert!(store.contains("r1").await.unwrap());
        assert!(!store.contains("r2").await.unwrap());
    }
}
