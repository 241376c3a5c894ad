//! Shared types for email triage.

use serde::{Deserialize, Serialize};

/// Triage category produced by the classifier.
///
/// Always exactly one of these three at triage time. The persisted `done`
/// state is a human-only transition — see [`crate::pipeline::EmailCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Noise — marketing, platform notifications. Not worth storing.
    Ignore,
    /// The attorney should see it, but it may not need a reply.
    Notify,
    /// Needs the attorney's attention and a response.
    Respond,
}

impl Category {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Notify => "notify",
            Self::Respond => "respond",
        }
    }

    /// Parse an exact category token (already trimmed and lowercased).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ignore" => Some(Self::Ignore),
            "notify" => Some(Self::Notify),
            "respond" => Some(Self::Respond),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of parsing the fallback LLM's free-text output.
///
/// Parsing failures are representable rather than silently defaulted; the
/// orchestrator maps `Unparseable` to `Notify` for compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Classified(Category),
    Unparseable,
}

/// Final classification for one email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// Free text. Length unbounded here; callers truncate before persistence.
    pub reasoning: String,
}

/// A high-confidence hit from the indicator matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorMatch {
    pub category: Category,
    pub confidence: f32,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels() {
        assert_eq!(Category::Ignore.label(), "ignore");
        assert_eq!(Category::Notify.label(), "notify");
        assert_eq!(Category::Respond.label(), "respond");
    }

    #[test]
    fn category_from_token_exact_match_only() {
        assert_eq!(Category::from_token("respond"), Some(Category::Respond));
        assert_eq!(Category::from_token("Respond"), None);
        assert_eq!(Category::from_token("respond."), None);
        assert_eq!(Category::from_token(""), None);
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::Notify).unwrap();
        assert_eq!(json, "\"notify\"");
    }
}
