//! Per-category content gatherers.
//!
//! Each gatherer enumerates its sources, fetches, normalizes, deduplicates
//! within its own batch, and tracks per-source (and, for social, per-platform)
//! status. A single bad source never aborts the whole gatherer — failures
//! are captured into the returned status rather than propagated as a
//! `Result` error out of `gather`, mirroring the teacher's one-async-trait-
//! per-capability style with an infallible-at-the-boundary shape.

pub mod community;
pub mod links;
pub mod news;
pub mod research;
pub mod social;

use crate::model::{CategoryCollectionStatus, CoverageWindow, Item};
use std::collections::HashSet;

/// Capability implemented by one gatherer per category.
#[async_trait::async_trait]
pub trait Gatherer: Send + Sync {
    async fn gather(&self, window: CoverageWindow) -> (Vec<Item>, CategoryCollectionStatus);
}

/// Per-batch dedup: keep the first occurrence of each id, scoped to a
/// single gatherer's own output. Cross-gatherer dedup happens later when
/// the orchestrator merges per-category items, keyed the same way.
pub(crate) fn dedup_first_occurrence(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.id.clone()) {
            out.push(item);
        }
    }
    out
}

/// Whether `published_at` falls within the run's coverage window.
pub(crate) fn in_window(published_at: chrono::DateTime<chrono::Utc>, window: CoverageWindow) -> bool {
    published_at >= window.start && published_at <= window.end
}
