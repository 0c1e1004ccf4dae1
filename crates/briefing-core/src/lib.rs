//! Pipeline orchestrator and agent runtime for the daily AI/ML briefing.
//!
//! Per-category gatherers collect items, a shared map-reduce analyzer
//! scores and summarizes them, a single cross-category synthesis pass
//! finds cross-cutting topics, and an executive-summary/link-enrichment
//! pass produces the final prose. [`orchestrate::Orchestrator`] drives the
//! whole sequence and writes the resulting artifacts atomically.

pub mod analyze;
pub mod config;
pub mod cost;
pub mod ecosystem;
pub mod error;
pub mod fingerprint;
pub mod gather;
pub mod http;
pub mod image;
pub mod llm;
pub mod model;
pub mod orchestrate;
pub mod sanitize;
pub mod summary;
pub mod topics;
