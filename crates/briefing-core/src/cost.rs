//! In-memory, mutex-guarded per-phase cost accumulator.
//!
//! There is no cross-run persistence requirement (deduplication and cost
//! tracking are both scoped to a single run), so this deliberately does not
//! carry the teacher's SQLite usage-history table — just the same
//! per-call-append, roll-up-on-read shape.

use crate::model::{CostSummary, PhaseCost};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Accumulates token usage and estimated cost per phase name across a run.
#[derive(Default)]
pub struct CostAccumulator {
    inner: Mutex<HashMap<String, PhaseCost>>,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call's usage against `phase`, accumulating into any prior
    /// tally for the same phase name.
    pub async fn record(
        &self,
        phase: &str,
        input_tokens: u64,
        output_tokens: u64,
        reasoning_tokens: u64,
        estimated_cost_usd: f64,
    ) {
        let mut guard = self.inner.lock().await;
        let entry = guard.entry(phase.to_string()).or_default();
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;
        entry.reasoning_tokens += reasoning_tokens;
        entry.estimated_cost_usd += estimated_cost_usd;
    }

    /// Snapshot the accumulator into a `CostSummary` for inclusion in the `DayReport`.
    pub async fn snapshot(&self) -> CostSummary {
        CostSummary {
            by_phase: self.inner.lock().await.clone(),
        }
    }
}
