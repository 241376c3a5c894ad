//! Indicator matcher — cheap pattern checks that short-circuit the LLM.
//!
//! An ordered, data-driven rule table evaluated first-match-wins over the
//! lowercased subject/body/sender. Unambiguous legal/team/urgent signals sit
//! above the aggressive ignore filters so important mail is never caught by
//! them. When nothing matches, the caller falls back to the LLM classifier.

use regex::Regex;
use tracing::debug;

use crate::config::TriageSettings;
use crate::triage::types::{Category, IndicatorMatch};

/// Subject terms marking voicemail/text/fax gateway notifications.
pub(crate) const VOICEMAIL_SUBJECT_TERMS: &[&str] = &["voice message", "text message", "fax"];

/// Subject keywords marking legal correspondence.
pub(crate) const LEGAL_KEYWORDS: &[&str] = &[
    "case",
    "court",
    "filing",
    "attorney",
    "lawyer",
    "legal",
    "hearing",
    "plaintiff",
    "defendant",
    "estate",
    "vs.",
    "v.",
];

/// Sender domains of social/notification platforms.
const PLATFORM_DOMAINS: &[&str] = &[
    "skool.com",
    "medium.com",
    "facebook.com",
    "twitter.com",
    "linkedin.com",
];

/// Body-position-sensitive signals only look at the top of the body.
const BODY_HEAD_CHARS: usize = 500;

/// More hyperlinks than this reads as a marketing blast.
const MAX_PLAIN_LINKS: usize = 5;

/// High confidence — critical categories decided without the LLM.
const CRITICAL_CONFIDENCE: f32 = 0.95;

/// Confidence for the aggressive ignore filters.
const IGNORE_CONFIDENCE: f32 = 0.9;

/// Lowercased views of one email, computed once per evaluation.
struct EmailText {
    subject: String,
    body: String,
    body_head: String,
    sender: String,
}

impl EmailText {
    fn prepare(subject: &str, body: &str, sender: &str) -> Self {
        let body_lower = body.to_lowercase();
        let body_head = body_lower.chars().take(BODY_HEAD_CHARS).collect();
        Self {
            subject: subject.to_lowercase(),
            body: body_lower,
            body_head,
            sender: sender.to_lowercase(),
        }
    }
}

pub(crate) fn has_voicemail_subject(subject_lower: &str) -> bool {
    VOICEMAIL_SUBJECT_TERMS
        .iter()
        .any(|term| subject_lower.contains(term))
}

pub(crate) fn sender_is_gateway(sender_lower: &str, gateways: &[String]) -> bool {
    gateways.iter().any(|g| sender_lower.contains(g.as_str()))
}

pub(crate) fn legal_keyword_in(subject_lower: &str) -> Option<&'static str> {
    LEGAL_KEYWORDS
        .iter()
        .find(|kw| subject_lower.contains(*kw))
        .copied()
}

/// Strict bill check shared with the safeguard layer: both terms required.
pub(crate) fn is_bill_due(subject_lower: &str) -> bool {
    subject_lower.contains("bill") && subject_lower.contains("due")
}

/// A rule returns its human-readable reason when it matches.
type Check = Box<dyn Fn(&EmailText) -> Option<String> + Send + Sync>;

struct IndicatorRule {
    category: Category,
    confidence: f32,
    check: Check,
}

/// Pure-function pattern matcher over subject/body/sender.
pub struct IndicatorMatcher {
    rules: Vec<IndicatorRule>,
}

impl IndicatorMatcher {
    /// Build the rule table from settings (team domains, gateway senders).
    pub fn new(settings: &TriageSettings) -> Self {
        let mut rules = Vec::new();

        // 1. Voicemail/text/fax notifications from a message gateway.
        let gateways = settings.voicemail_gateways.clone();
        rules.push(IndicatorRule {
            category: Category::Notify,
            confidence: CRITICAL_CONFIDENCE,
            check: Box::new(move |text| {
                (has_voicemail_subject(&text.subject)
                    && sender_is_gateway(&text.sender, &gateways))
                .then(|| "Voicemail/text/fax notification from message gateway".to_string())
            }),
        });

        // 2. Bills and payment notices. "payment required" fast-paths here
        // but is deliberately outside the safeguard's narrower bill rule.
        rules.push(IndicatorRule {
            category: Category::Notify,
            confidence: CRITICAL_CONFIDENCE,
            check: Box::new(|text| {
                (is_bill_due(&text.subject) || text.subject.contains("payment required"))
                    .then(|| "Bill or payment notification".to_string())
            }),
        });

        // 3. Legal correspondence.
        rules.push(IndicatorRule {
            category: Category::Respond,
            confidence: CRITICAL_CONFIDENCE,
            check: Box::new(|text| {
                legal_keyword_in(&text.subject)
                    .map(|kw| format!("Legal term in subject: '{kw}'"))
            }),
        });

        // 4. Internal/team senders.
        let team_domains = settings.team_domains.clone();
        rules.push(IndicatorRule {
            category: Category::Respond,
            confidence: CRITICAL_CONFIDENCE,
            check: Box::new(move |text| {
                team_domains
                    .iter()
                    .any(|d| text.sender.contains(d.as_str()))
                    .then(|| "Email from team member domain".to_string())
            }),
        });

        // 5. Platform notification signals, in order; first hit names itself.
        rules.extend(platform_rules());

        // 6. Marketing/promotional signals.
        rules.push(IndicatorRule {
            category: Category::Ignore,
            confidence: IGNORE_CONFIDENCE,
            check: Box::new(|text| {
                is_marketing(text).then(|| "Email contains marketing/promotional content".to_string())
            }),
        });

        Self { rules }
    }

    /// Evaluate the rule table in priority order, first match wins.
    ///
    /// Returns `None` when inconclusive — the caller must fall back to the
    /// LLM classifier. Pure: identical inputs always yield identical output.
    pub fn evaluate(&self, subject: &str, body: &str, sender: &str) -> Option<IndicatorMatch> {
        let text = EmailText::prepare(subject, body, sender);

        for rule in &self.rules {
            if let Some(reason) = (rule.check)(&text) {
                debug!(
                    category = rule.category.label(),
                    confidence = rule.confidence,
                    reason = %reason,
                    "Indicator rule matched"
                );
                return Some(IndicatorMatch {
                    category: rule.category,
                    confidence: rule.confidence,
                    reason,
                });
            }
        }

        None
    }
}

/// The ordered platform-notification signal list. Each entry carries its own
/// reason so the classification is explainable.
fn platform_rules() -> Vec<IndicatorRule> {
    let link_re = Regex::new(r"http").unwrap();

    let signals: Vec<Check> = vec![
        Box::new(|t: &EmailText| {
            t.subject
                .contains("new notification")
                .then(|| "Email contains 'new notification' in subject".to_string())
        }),
        Box::new(|t: &EmailText| {
            (t.subject.contains("notification") && !t.subject.contains("court"))
                .then(|| "Email contains 'notification' in subject".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.subject
                .contains("digest")
                .then(|| "Email is a digest".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body
                .contains("what you missed")
                .then(|| "Email contains 'what you missed'".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body
                .contains("notification since")
                .then(|| "Email contains 'notification since'".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.sender
                .contains("noreply")
                .then(|| "Email is from noreply address".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.sender
                .contains("no-reply")
                .then(|| "Email is from no-reply address".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.sender
                .contains("donotreply")
                .then(|| "Email is from donotreply address".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.sender
                .contains("notification")
                .then(|| "Email is from notification sender".to_string())
        }),
        Box::new(|t: &EmailText| {
            (t.subject.contains("updates") && t.subject.contains("new"))
                .then(|| "Email contains 'updates' and 'new' in subject".to_string())
        }),
        Box::new(|t: &EmailText| {
            PLATFORM_DOMAINS
                .iter()
                .any(|d| t.sender.contains(d))
                .then(|| "Email is from social/platform domain".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body_head
                .contains("view online")
                .then(|| "Email has 'view online' at top".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body
                .contains("view in browser")
                .then(|| "Email has 'view in browser'".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body
                .contains("email preferences")
                .then(|| "Email mentions email preferences".to_string())
        }),
        Box::new(|t: &EmailText| {
            (t.body.contains("unsubscribe")
                && (t.body.contains("offer") || t.body.contains("discount")))
            .then(|| "Email has unsubscribe and offer/discount".to_string())
        }),
        Box::new(move |t: &EmailText| {
            (link_re.find_iter(&t.body).count() > MAX_PLAIN_LINKS)
                .then(|| "Email contains many links (marketing)".to_string())
        }),
        Box::new(|t: &EmailText| {
            t.body
                .contains("too many emails")
                .then(|| "Email mentions 'too many emails'".to_string())
        }),
    ];

    signals
        .into_iter()
        .map(|check| IndicatorRule {
            category: Category::Ignore,
            confidence: IGNORE_CONFIDENCE,
            check,
        })
        .collect()
}

/// Marketing/promotional signal scan — any hit means ignore.
fn is_marketing(text: &EmailText) -> bool {
    let subject = &text.subject;
    let checks = [
        subject.contains("offer"),
        subject.contains("discount"),
        subject.contains("sale"),
        subject.contains("deal"),
        subject.contains("promotion"),
        subject.contains("special") && subject.contains("offer"),
        subject.contains("coupon"),
        subject.contains("limited time") || text.body_head.contains("limited time"),
        subject.contains("off") && subject.contains('%'),
        subject.contains("exclusive"),
        subject.contains("reward") && !subject.contains("law"),
        subject.contains("pro days") || text.body_head.contains("pro days"),
        subject.contains("come back"),
        subject.contains("miss you"),
        subject.contains("save") && subject.contains('$'),
    ];
    checks.iter().any(|&c| c)
}
