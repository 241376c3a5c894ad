//! lex-assist — email triage for a small law office.
//!
//! Incoming mail is classified as `ignore`, `notify`, or `respond` by a
//! fast indicator matcher, with an LLM fallback for inconclusive mail and
//! a safeguard layer that keeps legally or financially critical email from
//! being silently dropped.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod triage;
