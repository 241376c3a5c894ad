//! Ingestion pipeline — fetch, triage, store.
//!
//! Single-threaded by design: one email is classified at a time, with a
//! randomized delay between classifications to stay under upstream rate
//! limits. That delay is pacing, not concurrency control.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TriageSettings;
use crate::error::PipelineError;
use crate::pipeline::types::{EmailMessage, EmailRecord, EmailStore, MailSource};
use crate::triage::{Category, TriageOrchestrator};

/// Counters for one ingestion cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub fetched: usize,
    pub stored: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives the triage orchestrator over batches of mail.
///
/// The pipeline owns the caller-side triage contract: it skips storage of
/// `ignore` results and truncates reasoning before persistence. Per-message
/// failures are logged and counted, never fatal to the batch.
///
/// Dedup consults the store and a per-pipeline seen set. The seen set is
/// what keeps `ignore` results (which are never stored) from being re-sent
/// to the LLM on every poll cycle when a source re-reports old mail.
pub struct IngestPipeline {
    source: Arc<dyn MailSource>,
    store: Arc<dyn EmailStore>,
    orchestrator: Arc<TriageOrchestrator>,
    settings: TriageSettings,
    seen: Mutex<HashSet<String>>,
}

impl IngestPipeline {
    pub fn new(
        source: Arc<dyn MailSource>,
        store: Arc<dyn EmailStore>,
        orchestrator: Arc<TriageOrchestrator>,
        settings: TriageSettings,
    ) -> Self {
        Self {
            source,
            store,
            orchestrator,
            settings,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Run one fetch-triage-store cycle.
    pub async fn run_once(&self) -> Result<IngestSummary, PipelineError> {
        let messages = self.source.fetch_new().await?;
        let mut summary = IngestSummary {
            fetched: messages.len(),
            ..IngestSummary::default()
        };

        if messages.is_empty() {
            debug!(source = self.source.name(), "No new mail");
            return Ok(summary);
        }

        info!(
            source = self.source.name(),
            count = messages.len(),
            "Processing inbound mail"
        );

        for message in messages {
            match self.process_one(message).await {
                Ok(Outcome::Stored) => summary.stored += 1,
                Ok(Outcome::Ignored) => summary.ignored += 1,
                Ok(Outcome::Duplicate) => summary.skipped += 1,
                Err(e) => {
                    error!(error = %e, "Failed to process email in batch");
                    summary.failed += 1;
                }
            }
        }

        info!(
            stored = summary.stored,
            ignored = summary.ignored,
            skipped = summary.skipped,
            failed = summary.failed,
            "Ingestion cycle complete"
        );
        Ok(summary)
    }

    async fn process_one(&self, message: EmailMessage) -> Result<Outcome, PipelineError> {
        if self.already_seen(&message.id)? || self.store.contains(&message.id).await? {
            debug!(id = %message.id, "Skipping already processed email");
            return Ok(Outcome::Duplicate);
        }

        self.pace().await;

        let classification = self
            .orchestrator
            .classify(
                message.subject.as_deref().unwrap_or(""),
                &message.body,
                &message.sender,
            )
            .await;

        debug!(
            id = %message.id,
            sender = %message.sender,
            category = classification.category.label(),
            "Email triaged"
        );

        if classification.category == Category::Ignore {
            info!(
                id = %message.id,
                reason = %classification.reasoning.chars().take(120).collect::<String>(),
                "Ignoring email based on triage (not stored)"
            );
            self.remember(&message.id)?;
            return Ok(Outcome::Ignored);
        }

        let id = message.id.clone();
        let record = EmailRecord::from_classification(
            message,
            &classification,
            self.settings.reasoning_max_chars,
        );
        self.store.insert(record).await?;
        self.remember(&id)?;
        Ok(Outcome::Stored)
    }

    fn already_seen(&self, id: &str) -> Result<bool, PipelineError> {
        Ok(self
            .seen
            .lock()
            .map_err(|_| PipelineError::Store("seen set poisoned".to_string()))?
            .contains(id))
    }

    fn remember(&self, id: &str) -> Result<(), PipelineError> {
        self.seen
            .lock()
            .map_err(|_| PipelineError::Store("seen set poisoned".to_string()))?
            .insert(id.to_string());
        Ok(())
    }

    /// Randomized delay before each classification.
    async fn pace(&self) {
        let (min, max) = (self.settings.pacing_min_ms, self.settings.pacing_max_ms);
        if max == 0 || min > max {
            return;
        }
        let ms = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

enum Outcome {
    Stored,
    Ignored,
    Duplicate,
}

/// Spawn a background task that runs the pipeline on an interval.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop.
pub fn spawn_ingest_loop(
    pipeline: Arc<IngestPipeline>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Ingestion loop started — every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Ingestion loop shutting down");
                return;
            }

            if let Err(e) = pipeline.run_once().await {
                warn!(error = %e, "Ingestion cycle failed; will retry next tick");
            }
        }
    });

    (handle, shutdown_flag)
}
