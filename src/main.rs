use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lex_assist::config::TriageSettings;
use lex_assist::llm::{LlmBackend, LlmConfig, create_provider};
use lex_assist::pipeline::{IngestPipeline, JsonlSource, JsonlStore, spawn_ingest_loop};
use lex_assist::triage::{TriageOrchestrator, TriagePolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let backend = match std::env::var("LEX_ASSIST_BACKEND").as_deref() {
        Ok("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {key_var} not set");
        eprintln!("  export {key_var}=...");
        std::process::exit(1);
    });

    let model = std::env::var("LEX_ASSIST_MODEL")
        .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

    let inbox_path = std::env::var("LEX_ASSIST_INBOX")
        .unwrap_or_else(|_| "./data/inbox.jsonl".to_string());
    let store_path = std::env::var("LEX_ASSIST_STORE")
        .unwrap_or_else(|_| "./data/emails.jsonl".to_string());

    let mut settings = TriageSettings::default();
    if let Ok(domains) = std::env::var("LEX_ASSIST_TEAM_DOMAINS") {
        settings.team_domains = domains
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
    }

    eprintln!("📬 Lex Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   Inbox: {}", inbox_path);
    eprintln!("   Store: {}", store_path);

    let llm_config = LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;

    let orchestrator = Arc::new(TriageOrchestrator::new(
        llm,
        TriagePolicy::default(),
        &settings,
    ));

    let source = Arc::new(JsonlSource::new(&inbox_path));
    let store = Arc::new(JsonlStore::open(&store_path).await?);
    let pipeline = Arc::new(IngestPipeline::new(source, store, orchestrator, settings));

    // With a poll interval set, run continuously until Ctrl-C. Otherwise
    // process the inbox once and exit.
    let poll_secs: u64 = std::env::var("LEX_ASSIST_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if poll_secs > 0 {
        let (handle, shutdown) = spawn_ingest_loop(pipeline, Duration::from_secs(poll_secs));
        eprintln!("   Polling every {}s. Ctrl-C to stop.\n", poll_secs);

        tokio::signal::ctrl_c().await?;
        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
        eprintln!("\nShutting down.");
    } else {
        let summary = pipeline.run_once().await?;
        eprintln!(
            "Done: {} fetched, {} stored, {} ignored, {} duplicates, {} failed.",
            summary.fetched, summary.stored, summary.ignored, summary.skipped, summary.failed
        );
    }

    Ok(())
}
