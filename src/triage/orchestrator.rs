//! Triage orchestrator — indicators first, LLM fallback, safeguards last.
//!
//! `classify` is infallible by design: the LLM response is untrusted free
//! text and the call itself may fail, but the orchestrator always returns a
//! valid category, preferring a conservative `notify` over an error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TriageSettings;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::triage::indicators::IndicatorMatcher;
use crate::triage::safeguards::SafeguardPolicy;
use crate::triage::types::{Category, Classification, Verdict};

/// Max tokens for the triage call (kept tight — runs on every unclear email).
const TRIAGE_MAX_TOKENS: u64 = 512;

/// Temperature for triage (deterministic-ish).
const TRIAGE_TEMPERATURE: f64 = 0.1;

/// The email body is truncated in the prompt for token efficiency.
const BODY_PROMPT_CHARS: usize = 4000;

/// Caller-owned triage guidance, one block of examples per category.
///
/// The firm's real policy text lives with the caller; these defaults are a
/// generic skeleton so the classifier works out of the box.
#[derive(Debug, Clone)]
pub struct TriagePolicy {
    pub ignore_guidance: String,
    pub notify_guidance: String,
    pub respond_guidance: String,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            ignore_guidance: "\
- Automatic platform notifications and digests
- Marketing emails, newsletters, and promotional offers
- Mass announcements with unsubscribe or 'view in browser' links
- Emails from noreply addresses"
                .to_string(),
            notify_guidance: "\
- Court filing notifications
- Voicemail, text, and fax notifications
- Bills, invoices, and payment notices
- Updates on ongoing cases
- Receipts and confirmations of services"
                .to_string(),
            respond_guidance: "\
- Emails from attorneys, clients, or team members
- Emails about specific cases or legal proceedings
- Direct questions or requests for a decision
- Time-sensitive requests and deadlines"
                .to_string(),
        }
    }
}

/// Composes the indicator matcher, LLM fallback, and safeguard policy into
/// one `classify` call used by the ingestion pipeline.
pub struct TriageOrchestrator {
    llm: Arc<dyn LlmProvider>,
    matcher: IndicatorMatcher,
    safeguards: SafeguardPolicy,
    policy: TriagePolicy,
    fast_path_confidence: f32,
}

impl TriageOrchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: TriagePolicy, settings: &TriageSettings) -> Self {
        Self {
            llm,
            matcher: IndicatorMatcher::new(settings),
            safeguards: SafeguardPolicy::new(settings),
            policy,
            fast_path_confidence: settings.fast_path_confidence,
        }
    }

    /// Classify one email. Never fails, never panics.
    ///
    /// 1. Indicator matcher (fast path) — skips the LLM at high confidence.
    /// 2. LLM fallback for inconclusive mail; errors and unparseable output
    ///    default to `notify`.
    /// 3. Safeguard policy, unconditionally, whichever path decided.
    pub async fn classify(&self, subject: &str, body: &str, sender: &str) -> Classification {
        let (category, reasoning) = match self.matcher.evaluate(subject, body, sender) {
            Some(hit) if hit.confidence >= self.fast_path_confidence => {
                debug!(
                    category = hit.category.label(),
                    reason = %hit.reason,
                    "Indicator match — skipping LLM triage"
                );
                (hit.category, format!("Automatic categorization: {}", hit.reason))
            }
            _ => self.llm_fallback(subject, body, sender).await,
        };

        let (category, reasoning) = self.safeguards.apply(category, reasoning, subject, sender);

        Classification {
            category,
            reasoning,
        }
    }

    /// Call the LLM and parse its free-text verdict.
    async fn llm_fallback(&self, subject: &str, body: &str, sender: &str) -> (Category, String) {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt(&self.policy)),
            ChatMessage::user(build_user_prompt(subject, body, sender)),
        ])
        .with_temperature(TRIAGE_TEMPERATURE)
        .with_max_tokens(TRIAGE_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => {
                let (verdict, reasoning) = parse_verdict(&response.content);
                match verdict {
                    Verdict::Classified(category) => (category, reasoning),
                    Verdict::Unparseable => {
                        warn!(
                            raw = %response.content.chars().take(200).collect::<String>(),
                            "Unparseable triage response, defaulting to notify"
                        );
                        (Category::Notify, reasoning)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "LLM triage call failed, defaulting to notify");
                (Category::Notify, format!("Triage failed with error: {e}"))
            }
        }
    }
}

/// Parse the LLM's output: the first line must be exactly one category word.
///
/// Returns the verdict plus a reasoning string. Anything else on the first
/// line is `Unparseable`; the reasoning then embeds the raw text so nothing
/// is lost.
pub fn parse_verdict(raw: &str) -> (Verdict, String) {
    let trimmed = raw.trim();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let token = first.trim().to_lowercase();

    match Category::from_token(&token) {
        Some(category) => {
            let reasoning = rest.trim();
            let reasoning = if reasoning.is_empty() {
                "No reasoning provided".to_string()
            } else {
                reasoning.to_string()
            };
            (Verdict::Classified(category), reasoning)
        }
        None => (
            Verdict::Unparseable,
            format!(
                "Could not determine exact category from '{}', defaulting to 'notify'.\n{}",
                first.trim(),
                trimmed
            ),
        ),
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt(policy: &TriagePolicy) -> String {
    format!(
        "You are an email triage specialist for a small law office. Categorize each \
         incoming email into exactly one of three categories.\n\n\
         Be AGGRESSIVE about filtering out marketing and platform notifications; when in \
         doubt about those, choose \"ignore\". For emails from real people, clients, or \
         attorneys, be cautious and default to \"notify\".\n\n\
         1. ignore — emails to filter out entirely. Examples:\n{}\n\n\
         2. notify — emails the attorney should see but that may not need a reply. Examples:\n{}\n\n\
         3. respond — emails that need the attorney's attention and a response. Examples:\n{}\n\n\
         Your output must begin with EXACTLY ONE of these words on the first line: \
         \"ignore\", \"notify\", or \"respond\". Provide your reasoning on the following lines.",
        policy.ignore_guidance, policy.notify_guidance, policy.respond_guidance
    )
}

fn build_user_prompt(subject: &str, body: &str, sender: &str) -> String {
    let body_preview: String = body.chars().take(BODY_PROMPT_CHARS).collect();
    format!("Subject: {subject}\n\nFrom: {sender}\n\nBody:\n{body_preview}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    /// Mock LLM returning a fixed response (or failing), counting calls.
    struct MockLlm {
        response: Result<String, String>,
        calls: AtomicUsize,
    }

    impl MockLlm {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-triage"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    provider: "mock".to_string(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    fn orchestrator(llm: Arc<MockLlm>) -> TriageOrchestrator {
        TriageOrchestrator::new(llm, TriagePolicy::default(), &TriageSettings::default())
    }

    // ── parse_verdict ───────────────────────────────────────────────

    #[test]
    fn parse_exact_category_with_reasoning() {
        let (verdict, reasoning) = parse_verdict("respond\nClient asked a direct question.");
        assert_eq!(verdict, Verdict::Classified(Category::Respond));
        assert_eq!(reasoning, "Client asked a direct question.");
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        let (verdict, _) = parse_verdict("  IGNORE  \njust marketing");
        assert_eq!(verdict, Verdict::Classified(Category::Ignore));
    }

    #[test]
    fn parse_single_line_gets_default_reasoning() {
        let (verdict, reasoning) = parse_verdict("notify");
        assert_eq!(verdict, Verdict::Classified(Category::Notify));
        assert_eq!(reasoning, "No reasoning provided");
    }

    #[test]
    fn parse_preserves_multiline_reasoning() {
        let (_, reasoning) = parse_verdict("notify\nline one\nline two");
        assert_eq!(reasoning, "line one\nline two");
    }

    #[test]
    fn parse_unknown_first_token_is_unparseable() {
        let (verdict, reasoning) = parse_verdict("This email should be ignored.\nBecause spam.");
        assert_eq!(verdict, Verdict::Unparseable);
        assert!(reasoning.contains("Could not determine exact category"));
        assert!(reasoning.contains("This email should be ignored."));
    }

    #[test]
    fn parse_empty_response_is_unparseable() {
        let (verdict, _) = parse_verdict("");
        assert_eq!(verdict, Verdict::Unparseable);
    }

    // ── classify ────────────────────────────────────────────────────

    #[tokio::test]
    async fn fast_path_skips_llm() {
        let llm = MockLlm::returning("ignore\nwould have said ignore");
        let orch = orchestrator(llm.clone());

        let result = orch
            .classify("Case No. 24-1193 — filing deadline", "", "clerk@court.gov")
            .await;

        assert_eq!(result.category, Category::Respond);
        assert!(result.reasoning.starts_with("Automatic categorization:"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn inconclusive_mail_falls_back_to_llm() {
        let llm = MockLlm::returning("respond\nPre-existing client relationship.");
        let orch = orchestrator(llm.clone());

        let result = orch
            .classify(
                "Quick question about my dog's insurance",
                "Does my policy cover this?",
                "janedoe@gmail.com",
            )
            .await;

        assert_eq!(result.category, Category::Respond);
        assert_eq!(result.reasoning, "Pre-existing client relationship.");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn unparseable_llm_output_defaults_to_notify() {
        let llm = MockLlm::returning("I think this is probably spam, honestly.");
        let orch = orchestrator(llm);

        let result = orch
            .classify("Catching up", "Long time no talk!", "oldfriend@aol.com")
            .await;

        assert_eq!(result.category, Category::Notify);
        assert!(result.reasoning.contains("defaulting to 'notify'"));
    }

    #[tokio::test]
    async fn llm_failure_defaults_to_notify_with_error_text() {
        let llm = MockLlm::failing("connection timed out");
        let orch = orchestrator(llm);

        let result = orch
            .classify("Catching up", "Hello there", "oldfriend@aol.com")
            .await;

        assert_eq!(result.category, Category::Notify);
        assert!(result.reasoning.contains("Triage failed with error"));
        assert!(result.reasoning.contains("connection timed out"));
    }

    #[tokio::test]
    async fn llm_ignore_verdict_is_respected_for_plain_mail() {
        let llm = MockLlm::returning("ignore\nCold outreach from a vendor.");
        let orch = orchestrator(llm);

        let result = orch
            .classify(
                "Grow your practice with us",
                "We help firms like yours.",
                "jim@vendor-outreach.example.com",
            )
            .await;

        assert_eq!(result.category, Category::Ignore);
    }

    #[tokio::test]
    async fn voicemail_is_notify_regardless_of_llm() {
        // Fast path plus safeguard both protect this; the LLM never runs.
        let llm = MockLlm::returning("ignore\nautomated noise");
        let orch = orchestrator(llm.clone());

        let result = orch
            .classify(
                "New Voice Message from (555) 123-4567",
                "You have a voicemail.",
                "service@ringcentral.com",
            )
            .await;

        assert_eq!(result.category, Category::Notify);
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn system_prompt_carries_contract_and_policy() {
        let prompt = build_system_prompt(&TriagePolicy::default());
        assert!(prompt.contains("\"ignore\""));
        assert!(prompt.contains("\"notify\""));
        assert!(prompt.contains("\"respond\""));
        assert!(prompt.contains("first line"));
        assert!(prompt.contains("Court filing notifications"));
    }

    #[test]
    fn user_prompt_truncates_body() {
        let body = "x".repeat(10_000);
        let prompt = build_user_prompt("Subject", &body, "a@b.com");
        assert!(prompt.len() < 4200);
        assert!(prompt.contains("From: a@b.com"));
    }
}
