//! Safeguard policy — last-resort overrides on an `ignore` verdict.
//!
//! The ignore filters (indicator rules and the LLM's aggressive filtering
//! stance) can produce false negatives on legally or financially critical
//! mail. This pure post-filter runs after every classification, whichever
//! path produced it, and force-upgrades the category when needed.

use tracing::warn;

use crate::config::TriageSettings;
use crate::triage::indicators::{
    has_voicemail_subject, is_bill_due, legal_keyword_in, sender_is_gateway,
};
use crate::triage::types::Category;

/// Post-processing override layer for safety-critical content.
pub struct SafeguardPolicy {
    voicemail_gateways: Vec<String>,
}

impl SafeguardPolicy {
    pub fn new(settings: &TriageSettings) -> Self {
        Self {
            voicemail_gateways: settings.voicemail_gateways.clone(),
        }
    }

    /// Apply the overrides. Only an incoming `ignore` is ever changed.
    pub fn apply(
        &self,
        category: Category,
        reasoning: String,
        subject: &str,
        sender: &str,
    ) -> (Category, String) {
        if category != Category::Ignore {
            return (category, reasoning);
        }

        let subject_lower = subject.to_lowercase();
        let sender_lower = sender.to_lowercase();

        if has_voicemail_subject(&subject_lower)
            && sender_is_gateway(&sender_lower, &self.voicemail_gateways)
        {
            warn!(sender = %sender, "Safeguard override: voicemail/text/fax marked ignore");
            return (
                Category::Notify,
                format!(
                    "SAFEGUARD OVERRIDE: Voice/text/fax messages should not be ignored.\n\
                     Original reasoning: {reasoning}"
                ),
            );
        }

        if legal_keyword_in(&subject_lower).is_some() {
            warn!(subject = %subject, "Safeguard override: legal correspondence marked ignore");
            return (
                Category::Respond,
                format!(
                    "SAFEGUARD OVERRIDE: Legal correspondence should not be ignored.\n\
                     Original reasoning: {reasoning}"
                ),
            );
        }

        if is_bill_due(&subject_lower) {
            warn!(subject = %subject, "Safeguard override: bill/payment notice marked ignore");
            return (
                Category::Notify,
                format!(
                    "SAFEGUARD OVERRIDE: Bills and payment notices should not be ignored.\n\
                     Original reasoning: {reasoning}"
                ),
            );
        }

        (category, reasoning)
    }
}
