//! Core data types shared across every pipeline phase.
//!
//! Every wire-facing type here derives `Serialize`/`Deserialize` so it can
//! round-trip through the JSON artifacts written under `web/data/<date>/`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four content categories the pipeline gathers and analyzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    News,
    Research,
    Social,
    Community,
}

impl Category {
    /// All four categories, in the fixed order the orchestrator fans out.
    pub const ALL: [Category; 4] = [
        Category::News,
        Category::Research,
        Category::Social,
        Category::Community,
    ];

    /// The lowercase name used in URLs, file names, and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Research => "research",
            Category::Social => "social",
            Category::Community => "community",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news" => Ok(Category::News),
            "research" => Ok(Category::Research),
            "social" => Ok(Category::Social),
            "community" => Ok(Category::Community),
            _ => Err(()),
        }
    }
}

/// The kind of source an item originated from, used for ranking tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    Api,
    Forum,
    Preprint,
}

impl SourceKind {
    /// Ranking tie-break preference, lower sorts first: preprint > rss > forum > microblog(api).
    pub fn tie_break_rank(self) -> u8 {
        match self {
            SourceKind::Preprint => 0,
            SourceKind::Rss => 1,
            SourceKind::Forum => 2,
            SourceKind::Api => 3,
        }
    }
}

/// A source of content loaded from configuration, immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// URL, handle, or subreddit/forum name identifying this source.
    pub identifier: String,
    /// The category this source feeds.
    pub category: Category,
    /// The kind of source, used for fetch-policy selection and ranking.
    pub source_kind: SourceKind,
}

/// A single gathered piece of content, normalized to a common shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// First 12 hex characters of `sha256(normalized_url + '\n' + title)`.
    pub id: String,
    pub category: Category,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub url: String,
    pub title: String,
    /// Sanitized plain text; never raw user-supplied HTML.
    pub content: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    /// Source-specific extra data: engagement counts, preprint category,
    /// referenced URLs, `announcement_type` for preprint items.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Assigned by the analyzer; `0` until analysis runs or a batch is dropped.
    #[serde(default)]
    pub score: u8,
    /// Per-item summary assigned by the analyzer's map phase.
    #[serde(default)]
    pub per_item_summary: Option<String>,
    /// Theme tags assigned by the analyzer's map phase.
    #[serde(default)]
    pub themes_tags: Vec<String>,
}

/// A named cluster of items within a category report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub item_count: usize,
    pub description: String,
}

/// The outcome of collecting or analyzing a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionOutcome {
    Success,
    Partial,
    Failed,
    Skipped,
}

/// The run-wide projection of every phase outcome onto three buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Partial,
    Failed,
}

impl RunOutcome {
    /// Fold two outcomes into the worse of the two: `Success < Partial < Failed`.
    pub fn worst_of(self, other: RunOutcome) -> RunOutcome {
        use RunOutcome::{Failed, Partial, Success};
        match (self, other) {
            (Failed, _) | (_, Failed) => Failed,
            (Partial, _) | (_, Partial) => Partial,
            (Success, Success) => Success,
        }
    }
}

impl From<CollectionOutcome> for RunOutcome {
    fn from(outcome: CollectionOutcome) -> Self {
        match outcome {
            CollectionOutcome::Success | CollectionOutcome::Skipped => RunOutcome::Success,
            CollectionOutcome::Partial => RunOutcome::Partial,
            CollectionOutcome::Failed => RunOutcome::Failed,
        }
    }
}

/// The status of a single source's fetch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source_name: String,
    pub category: Category,
    pub outcome: CollectionOutcome,
    pub item_count: usize,
    pub message: Option<String>,
}

/// The status of a single social platform within the social gatherer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub platform: String,
    pub outcome: CollectionOutcome,
    pub item_count: usize,
    pub message: Option<String>,
}

/// Per-category collection status, produced by a gatherer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CategoryCollectionStatus {
    pub per_source: Vec<SourceStatus>,
    #[serde(default)]
    pub per_platform: Vec<PlatformStatus>,
    /// A human-readable note for legitimate zero-item outcomes (e.g. weekends).
    pub notice: Option<String>,
}

impl CategoryCollectionStatus {
    /// The worst outcome across every source (and platform, if any) tracked here.
    pub fn overall(&self) -> CollectionOutcome {
        let mut worst = CollectionOutcome::Success;
        for s in self.per_source.iter().chain(
            self.per_platform
                .iter()
                .map(|p| &SourceStatus {
                    source_name: p.platform.clone(),
                    category: Category::Social,
                    outcome: p.outcome,
                    item_count: p.item_count,
                    message: p.message.clone(),
                })
                .collect::<Vec<_>>()
                .iter(),
        ) {
            worst = worse_outcome(worst, s.outcome);
        }
        worst
    }
}

fn worse_outcome(a: CollectionOutcome, b: CollectionOutcome) -> CollectionOutcome {
    use CollectionOutcome::{Failed, Partial, Skipped, Success};
    match (a, b) {
        (Failed, _) | (_, Failed) => Failed,
        (Partial, _) | (_, Partial) => Partial,
        (Success, _) | (_, Success) => Success,
        (Skipped, Skipped) => Skipped,
    }
}

/// Run-wide collection status: every category's status plus the overall projection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollectionStatus {
    pub categories: HashMap<String, CategoryCollectionStatus>,
    pub overall: Option<RunOutcome>,
}

/// The output of the analyzer's map-reduce pass for a single category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: Category,
    pub items: Vec<Item>,
    pub themes: Vec<Theme>,
    pub category_summary: String,
    /// Sorted strictly nonincreasing by `score`, truncated to the configured top-k.
    pub top_items: Vec<Item>,
    pub item_count_total: usize,
    /// Set when zero items is a legitimate outcome (e.g. weekend preprint gaps).
    pub notice: Option<String>,
}

/// A cross-category topic synthesized from multiple CategoryReports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub description: String,
    pub category_mix: HashMap<Category, usize>,
    pub referenced_item_ids: Vec<String>,
}

/// A single AI/ML model or product release tracked in the ecosystem timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ReleaseSource {
    Curated,
    AutoDetected,
    ExternalRegistry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcosystemRelease {
    pub vendor: String,
    pub model_name: String,
    pub general_availability_date: Option<NaiveDate>,
    pub api_availability_date: Option<NaiveDate>,
    pub confidence: f64,
    pub source: ReleaseSource,
}

/// Per-phase token and cost tally, one entry per phase name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub estimated_cost_usd: f64,
}

/// Run-wide cost summary: per-phase tallies plus a computed total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub by_phase: HashMap<String, PhaseCost>,
}

impl CostSummary {
    /// The sum of every phase's cost, computed on read rather than stored.
    pub fn total(&self) -> PhaseCost {
        let mut total = PhaseCost::default();
        for phase in self.by_phase.values() {
            total.input_tokens += phase.input_tokens;
            total.output_tokens += phase.output_tokens;
            total.reasoning_tokens += phase.reasoning_tokens;
            total.estimated_cost_usd += phase.estimated_cost_usd;
        }
        total
    }
}

/// The terminal artifact of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayReport {
    pub report_date: NaiveDate,
    pub coverage_start: DateTime<Utc>,
    pub coverage_end: DateTime<Utc>,
    pub executive_summary: String,
    pub executive_summary_html: String,
    pub top_topics: Vec<Topic>,
    pub categories: HashMap<String, CategoryReport>,
    pub collection_status: CollectionStatus,
    pub hero_image_url: Option<String>,
    pub hero_image_prompt: Option<String>,
    pub cost_summary: CostSummary,
}

/// The 24h local-time window a run covers, distinct from `report_date`.
#[derive(Debug, Clone, Copy)]
pub struct CoverageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
