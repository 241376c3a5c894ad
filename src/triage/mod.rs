//! Email triage — indicator rules, LLM fallback, safeguard overrides.
//!
//! Every email flows through:
//! 1. `IndicatorMatcher::evaluate()` — fast pattern matching (no LLM)
//! 2. LLM fallback (only when the matcher is inconclusive)
//! 3. `SafeguardPolicy::apply()` — last-resort upgrades of `ignore` verdicts
//!
//! The orchestrator always returns a valid category. Unparseable or failed
//! LLM calls default to `notify` rather than surfacing an error.

pub mod indicators;
pub mod orchestrator;
pub mod safeguards;
pub mod types;

pub use indicators::IndicatorMatcher;
pub use orchestrator::{TriageOrchestrator, TriagePolicy, parse_verdict};
pub use safeguards::SafeguardPolicy;
pub use types::{Category, Classification, IndicatorMatch, Verdict};
