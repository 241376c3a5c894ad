//! Configuration types.

/// Triage tuning knobs shared by the matcher, safeguards, and pipeline.
#[derive(Debug, Clone)]
pub struct TriageSettings {
    /// Minimum indicator confidence that skips the LLM fallback.
    pub fast_path_confidence: f32,
    /// Sender domains treated as internal/team mail (always `respond`).
    pub team_domains: Vec<String>,
    /// Sender substrings identifying voicemail/fax/text gateways.
    pub voicemail_gateways: Vec<String>,
    /// Reasoning is truncated to this many characters before persistence.
    pub reasoning_max_chars: usize,
    /// Randomized delay range (milliseconds) before each classification,
    /// to avoid upstream rate limits. A zero max disables pacing.
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            fast_path_confidence: 0.9,
            team_domains: Vec::new(),
            voicemail_gateways: vec!["ringcentral".to_string()],
            reasoning_max_chars: 1000,
            pacing_min_ms: 500,
            pacing_max_ms: 2000,
        }
    }
}

impl TriageSettings {
    /// Settings with pacing disabled (for tests and one-shot runs).
    pub fn without_pacing(mut self) -> Self {
        self.pacing_min_ms = 0;
        self.pacing_max_ms = 0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_triage_contract() {
        let settings = TriageSettings::default();
        assert!((settings.fast_path_confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(settings.reasoning_max_chars, 1000);
        assert!(settings.voicemail_gateways.contains(&"ringcentral".to_string()));
    }

    #[test]
    fn without_pacing_zeroes_delay() {
        let settings = TriageSettings::default().without_pacing();
        assert_eq!(settings.pacing_min_ms, 0);
        assert_eq!(settings.pacing_max_ms, 0);
    }
}
