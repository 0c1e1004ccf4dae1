//! Top-level run orchestration: phases 0–5 from config-already-loaded
//! clients through to atomic artifact writes and manifest update.

use crate::cost::CostAccumulator;
use crate::ecosystem::EcosystemContext;
use crate::error::{LlmError, OrchestratorError, SummaryError};
use crate::gather::links::extract_links_for_fetch;
use crate::gather::news::NewsGatherer;
use crate::gather::Gatherer;
use crate::analyze::Analyzer;
use crate::image::{AspectRatio, ImageClient, ImageSize};
use crate::llm::LlmClient;
use crate::model::{
    Category, CategoryReport, CollectionStatus, CoverageWindow, DayReport, RunOutcome,
};
use crate::sanitize::render_paragraphs_html;
use crate::summary::{enrich_links, executive_summary, fallback_summary};
use crate::topics::synthesize_topics;
use chrono::NaiveDate;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The outcome of a single end-to-end run, paired with the assembled
/// artifact. Infallible except for the phase-5 write, which surfaces as
/// `OrchestratorError::Write` from `run` itself.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub report: DayReport,
    pub outcome: RunOutcome,
}

/// Drives one full run: gather → analyze → synthesize → summarize →
/// enrich → write. Constructed once in `main` from already-validated
/// config and already-constructed clients.
pub struct Orchestrator {
    http: Arc<crate::http::HttpPool>,
    llm: Arc<dyn LlmClient>,
    image: Option<Arc<dyn ImageClient>>,
    cost: Arc<CostAccumulator>,
    gatherers: [Arc<dyn Gatherer>; 4],
    analyzers: [Arc<dyn Analyzer>; 4],
    /// Concrete handle onto the same news gatherer present (as a trait
    /// object) in `gatherers[0]`, used after phase 1 to fetch smart-link
    /// candidate URLs surfaced from the social category's items — a
    /// capability outside the `Gatherer` trait's infallible-fan-out shape.
    news_gatherer: Arc<NewsGatherer>,
    ecosystem_path: PathBuf,
    ecosystem_registry_url: String,
    output_root: PathBuf,
    deadline: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<crate::http::HttpPool>,
        llm: Arc<dyn LlmClient>,
        image: Option<Arc<dyn ImageClient>>,
        cost: Arc<CostAccumulator>,
        gatherers: [Arc<dyn Gatherer>; 4],
        analyzers: [Arc<dyn Analyzer>; 4],
        news_gatherer: Arc<NewsGatherer>,
        ecosystem_path: PathBuf,
        ecosystem_registry_url: String,
        output_root: PathBuf,
        deadline: Duration,
    ) -> Self {
        Self {
            http,
            llm,
            image,
            cost,
            gatherers,
            analyzers,
            news_gatherer,
            ecosystem_path,
            ecosystem_registry_url,
            output_root,
            deadline,
        }
    }

    pub async fn run(&self, report_date: NaiveDate) -> Result<RunReport, OrchestratorError> {
        let start = Instant::now();
        let window = coverage_window(report_date);

        // Phase 0: load ecosystem grounding context, shared read-only from here on.
        let registry =
            crate::ecosystem::HttpRegistryClient::new(self.http.clone(), self.ecosystem_registry_url.clone());
        let ecosystem = match EcosystemContext::load(&self.ecosystem_path, &registry).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(error = %e, "ecosystem context load failed, continuing with empty grounding");
                EcosystemContext::empty()
            }
        };

        // Phase 1: fan out gatherers, one per category, concurrently.
        let gather_deadline = self.deadline.saturating_sub(start.elapsed());
        let gather_results = match tokio::time::timeout(
            gather_deadline,
            join_all(self.gatherers.iter().map(|g| g.gather(window))),
        )
        .await
        {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!("gather phase exceeded run deadline, proceeding with no items");
                let fallback: Vec<(Vec<crate::model::Item>, crate::model::CategoryCollectionStatus)> =
                    Category::ALL.iter().map(|_| (Vec::new(), Default::default())).collect();
                fallback
            }
        };

        let mut items_by_category: Vec<Vec<crate::model::Item>> = Vec::with_capacity(4);
        let mut collection_status = CollectionStatus {
            categories: Default::default(),
            overall: None,
        };
        let mut gather_outcome = RunOutcome::Success;
        let mut surviving_categories = 0usize;
        for (category, (items, status)) in Category::ALL.into_iter().zip(gather_results.into_iter()) {
            let outcome = status.overall();
            if outcome != crate::model::CollectionOutcome::Failed {
                surviving_categories += 1;
            }
            gather_outcome = gather_outcome.worst_of(outcome.into());
            collection_status.categories.insert(category.as_str().to_string(), status);
            items_by_category.push(items);
        }
        if surviving_categories == 0 {
            gather_outcome = gather_outcome.worst_of(RunOutcome::Failed);
        }

        // Smart-link extraction: surface URLs mentioned in social items
        // worth fetching as standalone news articles, appended to the News
        // category's item set before analysis runs.
        let social_index = Category::ALL
            .iter()
            .position(|&c| c == Category::Social)
            .expect("Social is always present in Category::ALL");
        let news_index = Category::ALL
            .iter()
            .position(|&c| c == Category::News)
            .expect("News is always present in Category::ALL");
        if !items_by_category[social_index].is_empty() {
            let linked_urls = match extract_links_for_fetch(&items_by_category[social_index], &*self.llm).await {
                Ok(urls) => urls,
                Err(e) => return Err(OrchestratorError::LlmUnavailable(e)),
            };
            if !linked_urls.is_empty() {
                let linked_items = self.news_gatherer.ingest_linked_articles(&linked_urls, window).await;
                items_by_category[news_index].extend(linked_items);
                items_by_category[news_index] =
                    crate::gather::dedup_first_occurrence(std::mem::take(&mut items_by_category[news_index]));
            }
        }

        // Phase 2: fan out analyzers, one per category, concurrently.
        let analyze_deadline = self.deadline.saturating_sub(start.elapsed());
        let analyze_futures = self
            .analyzers
            .iter()
            .zip(items_by_category.iter())
            .map(|(analyzer, items)| analyzer.analyze(items, &ecosystem));
        let reports_vec = match tokio::time::timeout(analyze_deadline, join_all(analyze_futures)).await {
            Ok(reports) => reports,
            Err(_) => {
                tracing::warn!("analyze phase exceeded run deadline, proceeding with empty reports");
                let fallback: Vec<Result<CategoryReport, LlmError>> =
                    Category::ALL.iter().map(|&category| Ok(empty_report(category))).collect();
                fallback
            }
        };
        let mut reports_ok = Vec::with_capacity(reports_vec.len());
        for result in reports_vec {
            match result {
                Ok(report) => reports_ok.push(report),
                Err(e) => return Err(OrchestratorError::LlmUnavailable(e)),
            }
        }
        let reports: [CategoryReport; 4] = reports_ok
            .try_into()
            .unwrap_or_else(|_| panic!("analyzer fan-out must yield exactly four reports"));

        let total_items: usize = reports.iter().map(|r| r.item_count_total).sum();

        // Phase 3: cross-category topic synthesis. `ReasoningUnavailable` is
        // fatal by contract (the reasoning-present invariant), not a
        // degrade-to-partial case, so it aborts the run before any artifact
        // is written.
        let topics = match synthesize_topics(&reports, &ecosystem, &*self.llm).await {
            Ok(topics) => topics,
            Err(e) => return Err(OrchestratorError::LlmUnavailable(e)),
        };
        let mut overall = gather_outcome;
        if total_items > 0 && topics.is_empty() {
            overall = overall.worst_of(RunOutcome::Partial);
        }

        // Phase 4: executive summary, with deterministic fallback on failure.
        let summary_text = match executive_summary(&reports, &topics, &*self.llm).await {
            Ok(text) => text,
            Err(SummaryError::Llm(e @ LlmError::ReasoningUnavailable { .. })) => {
                return Err(OrchestratorError::LlmUnavailable(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "executive summary call failed, using deterministic fallback");
                overall = overall.worst_of(RunOutcome::Partial);
                fallback_summary(&reports)
            }
        };

        // Phase 4.5: best-effort link enrichment.
        let enriched_summary = match enrich_links(&summary_text, &reports, report_date, &*self.llm).await {
            Ok(enriched) => enriched,
            Err(SummaryError::Llm(e @ LlmError::ReasoningUnavailable { .. })) => {
                return Err(OrchestratorError::LlmUnavailable(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "link enrichment failed, using unenriched summary");
                summary_text.clone()
            }
        };
        let summary_html = render_paragraphs_html(
            &enriched_summary
                .split("\n\n")
                .map(|p| p.to_string())
                .collect::<Vec<_>>(),
        );

        // Phase 4.6: best-effort ecosystem enrichment, never blocks the run.
        let all_items: Vec<crate::model::Item> =
            reports.iter().flat_map(|r| r.items.iter().cloned()).collect();
        let detected = ecosystem.detect_new_releases(&all_items, &*self.llm).await;
        if !detected.is_empty() {
            if let Err(e) = crate::ecosystem::append_curated_releases(&self.ecosystem_path, &detected) {
                tracing::warn!(error = %e, "failed to append auto-detected ecosystem releases");
            }
        }

        // Phase 4.7: best-effort hero image; missing config means this is
        // simply skipped (the image client is absent).
        let (hero_image_url, hero_image_prompt, hero_image_bytes) = match &self.image {
            Some(client) => {
                let prompt = hero_image_prompt(&enriched_summary, &topics);
                match client
                    .generate(&prompt, None, AspectRatio::Widescreen, ImageSize::Large)
                    .await
                {
                    Ok(bytes) => (
                        Some(format!("web/data/{report_date}/hero.webp")),
                        Some(prompt),
                        Some(bytes),
                    ),
                    Err(e) => {
                        tracing::warn!(error = %e, "hero image generation failed, skipping");
                        (None, None, None)
                    }
                }
            }
            None => (None, None, None),
        };

        let cost_summary = self.cost.snapshot().await;

        let categories_map: std::collections::HashMap<String, CategoryReport> = Category::ALL
            .into_iter()
            .zip(reports.iter().cloned())
            .map(|(c, r)| (c.as_str().to_string(), r))
            .collect();

        collection_status.overall = Some(overall);

        let day_report = DayReport {
            report_date,
            coverage_start: window.start,
            coverage_end: window.end,
            executive_summary: enriched_summary,
            executive_summary_html: summary_html,
            top_topics: topics,
            categories: categories_map,
            collection_status,
            hero_image_url,
            hero_image_prompt,
            cost_summary,
        };

        // Phase 5: assemble and atomically write artifacts.
        let output_dir = self.output_root.join("web/data").join(report_date.to_string());
        let mut artifacts: Vec<(String, Vec<u8>)> = Vec::new();
        artifacts.push((
            "summary.json".to_string(),
            serde_json::to_vec_pretty(&day_report).expect("DayReport always serializes"),
        ));
        for report in &reports {
            artifacts.push((
                format!("{}.json", report.category.as_str()),
                serde_json::to_vec_pretty(report).expect("CategoryReport always serializes"),
            ));
        }
        if let Some(bytes) = hero_image_bytes {
            artifacts.push(("hero.webp".to_string(), bytes));
        }

        let write_result = write_artifacts(&output_dir, &artifacts);

        tracing::info!(
            report_date = %report_date,
            total_items,
            total_cost_usd = cost_summary_total(&day_report.cost_summary),
            outcome = ?overall,
            "run finished"
        );

        match write_result {
            Ok(()) => {
                if let Err(e) = update_manifest(&self.output_root, report_date) {
                    tracing::warn!(error = %e, "failed to update report manifest");
                }
                Ok(RunReport {
                    report: day_report,
                    outcome: overall,
                })
            }
            Err(e) => Err(OrchestratorError::Write(e)),
        }
    }
}

fn cost_summary_total(summary: &crate::model::CostSummary) -> f64 {
    summary.total().estimated_cost_usd
}

/// Coverage ends at `report_date` midnight Eastern, not UTC: a post from
/// 11pm ET the prior evening must land in the window that closes as the
/// new report day begins locally, not 19-20h earlier on the UTC clock.
fn coverage_window(report_date: NaiveDate) -> CoverageWindow {
    use chrono::TimeZone;

    let midnight_et = report_date.and_hms_opt(0, 0, 0).expect("valid midnight time");
    let end = chrono_tz::America::New_York
        .from_local_datetime(&midnight_et)
        .single()
        .expect("ET midnight is never ambiguous or skipped by DST")
        .with_timezone(&chrono::Utc);
    let start = end - chrono::Duration::hours(24);
    CoverageWindow { start, end }
}

fn empty_report(category: Category) -> CategoryReport {
    CategoryReport {
        category,
        items: Vec::new(),
        themes: Vec::new(),
        category_summary: String::new(),
        top_items: Vec::new(),
        item_count_total: 0,
        notice: Some("run deadline exceeded before analysis completed".to_string()),
    }
}

fn hero_image_prompt(summary: &str, topics: &[crate::model::Topic]) -> String {
    let topic_titles = topics
        .iter()
        .map(|t| t.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "A clean, editorial hero illustration for today's AI/ML briefing. Topics: {topic_titles}. Summary: {}",
        summary.chars().take(400).collect::<String>()
    )
}

/// Write every artifact to `<name>.tmp` in `output_dir`, fsync each, then
/// rename every `.tmp` to its final name only once every write has
/// succeeded — "either all declared artifacts exist and are well-formed,
/// or none do."
fn write_artifacts(output_dir: &std::path::Path, artifacts: &[(String, Vec<u8>)]) -> std::io::Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let mut tmp_paths = Vec::with_capacity(artifacts.len());
    for (name, bytes) in artifacts {
        let tmp_path = output_dir.join(format!("{name}.tmp"));
        let file = std::fs::File::create(&tmp_path)?;
        {
            use std::io::Write;
            let mut file = file;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        tmp_paths.push((tmp_path, output_dir.join(name)));
    }

    for (tmp_path, final_path) in tmp_paths {
        std::fs::rename(tmp_path, final_path)?;
    }
    Ok(())
}

/// Update `web/data/index.json`, the manifest of all report dates.
/// Missing-file is tolerated as an empty list; the manifest is rewritten
/// sorted after appending `report_date` if not already present.
fn update_manifest(output_root: &std::path::Path, report_date: NaiveDate) -> std::io::Result<()> {
    let manifest_dir = output_root.join("web/data");
    let manifest_path = manifest_dir.join("index.json");

    let mut dates: Vec<String> = match std::fs::read_to_string(&manifest_path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };

    let date_str = report_date.to_string();
    if !dates.contains(&date_str) {
        dates.push(date_str);
    }
    dates.sort();

    let serialized = serde_json::to_vec_pretty(&dates).expect("Vec<String> always serializes");
    write_artifacts(&manifest_dir, &[("index.json".to_string(), serialized)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn coverage_window_spans_24_hours_ending_at_report_date() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let window = coverage_window(date);
        assert_eq!(window.end - window.start, chrono::Duration::hours(24));
        assert_eq!(window.end.date_naive(), date);
    }

    #[test]
    fn coverage_window_end_is_midnight_eastern_not_midnight_utc() {
        // July 31 falls under Eastern Daylight Time (UTC-4): midnight ET is 04:00 UTC.
        let summer = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let summer_window = coverage_window(summer);
        assert_eq!(summer_window.end.time(), chrono::NaiveTime::from_hms_opt(4, 0, 0).unwrap());

        // January 15 falls under Eastern Standard Time (UTC-5): midnight ET is 05:00 UTC.
        let winter = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let winter_window = coverage_window(winter);
        assert_eq!(winter_window.end.time(), chrono::NaiveTime::from_hms_opt(5, 0, 0).unwrap());
    }

    #[test]
    fn write_artifacts_writes_all_files_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output_dir = dir.path().join("2026-07-31");
        let artifacts = vec![
            ("summary.json".to_string(), b"{}".to_vec()),
            ("news.json".to_string(), b"[]".to_vec()),
        ];
        write_artifacts(&output_dir, &artifacts).expect("write succeeds");
        assert!(output_dir.join("summary.json").exists());
        assert!(output_dir.join("news.json").exists());
        assert!(!output_dir.join("summary.json.tmp").exists());
    }

    #[test]
    fn update_manifest_appends_and_sorts_report_dates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let second = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        update_manifest(dir.path(), second).expect("first update");
        update_manifest(dir.path(), first).expect("second update");

        let raw = std::fs::read_to_string(dir.path().join("web/data/index.json")).expect("read manifest");
        let dates: Vec<String> = serde_json::from_str(&raw).expect("parse manifest");
        assert_eq!(dates, vec!["2026-07-30".to_string(), "2026-07-31".to_string()]);
    }

    #[test]
    fn update_manifest_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        update_manifest(dir.path(), date).expect("update succeeds on missing manifest");
    }
}

/// End-to-end scenarios composing mock gatherers/analyzers/LLM clients
/// around a real `Orchestrator`, following the teacher's
/// `automation/discovery_loop.rs` mock-struct test idiom. ID determinism
/// (same URL/title, different fetch time ⇒ same id) is already covered by
/// `fingerprint::tests::fingerprint_id_is_deterministic` and is not
/// re-derived here.
#[cfg(test)]
mod end_to_end_scenarios {
    use super::*;
    use crate::model::{CategoryCollectionStatus, CollectionOutcome, Item, PlatformStatus, SourceKind, SourceStatus};
    use chrono::Utc;

    struct ScenarioGatherer {
        items: Vec<Item>,
        status: CategoryCollectionStatus,
    }

    #[async_trait::async_trait]
    impl Gatherer for ScenarioGatherer {
        async fn gather(&self, _window: CoverageWindow) -> (Vec<Item>, CategoryCollectionStatus) {
            (self.items.clone(), self.status.clone())
        }
    }

    struct ScenarioAnalyzer {
        report: CategoryReport,
    }

    #[async_trait::async_trait]
    impl Analyzer for ScenarioAnalyzer {
        async fn analyze(
            &self,
            _items: &[Item],
            _grounding: &EcosystemContext,
        ) -> Result<CategoryReport, LlmError> {
            Ok(self.report.clone())
        }
    }

    struct ScriptedLlmClient {
        reasoning_unavailable: bool,
        topic_item_id: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn call_with_reasoning(
            &self,
            _system: &str,
            _user: &str,
            budget: crate::llm::ReasoningBudget,
            phase: &str,
        ) -> Result<crate::llm::LlmResponse, LlmError> {
            if self.reasoning_unavailable {
                return Err(LlmError::ReasoningUnavailable {
                    mode: "proxy".to_string(),
                    remediation: "verify the proxy passes through the thinking block".to_string(),
                });
            }
            let text = if phase == "topics:synthesize" {
                format!(
                    "```json\n[{{\"title\": \"Cross-cutting topic\", \"description\": \"spans categories\", \"item_ids\": [\"{}\"]}}]\n```",
                    self.topic_item_id
                )
            } else {
                "A plain executive summary paragraph.".to_string()
            };
            Ok(crate::llm::LlmResponse {
                text,
                reasoning_blocks: if budget.tokens() > 0 { vec!["thinking".to_string()] } else { Vec::new() },
                usage: crate::llm::LlmUsage::default(),
            })
        }
    }

    fn item(id: &str, category: Category) -> Item {
        Item {
            id: id.to_string(),
            category,
            source_name: "test-source".into(),
            source_kind: SourceKind::Rss,
            url: format!("https://example.com/{id}"),
            title: format!("Title {id}"),
            content: "content".into(),
            author: None,
            published_at: Utc::now(),
            collected_at: Utc::now(),
            metadata: Default::default(),
            score: 0,
            per_item_summary: None,
            themes_tags: Vec::new(),
        }
    }

    fn blank_report(category: Category) -> CategoryReport {
        CategoryReport {
            category,
            items: Vec::new(),
            themes: Vec::new(),
            category_summary: String::new(),
            top_items: Vec::new(),
            item_count_total: 0,
            notice: Some("no items for this category".to_string()),
        }
    }

    fn build_test_orchestrator(
        gatherers: [Arc<dyn Gatherer>; 4],
        analyzers: [Arc<dyn Analyzer>; 4],
        llm: Arc<dyn LlmClient>,
        output_root: &std::path::Path,
    ) -> Orchestrator {
        let http = Arc::new(crate::http::HttpPool::new(4));
        Orchestrator::new(
            http.clone(),
            llm,
            None,
            Arc::new(CostAccumulator::new()),
            gatherers,
            analyzers,
            Arc::new(NewsGatherer::new(http, Vec::new())),
            output_root.join("ecosystem.json"),
            // Deliberately unroutable: exercises the registry's own
            // fetch-failure-degrades-to-curated-only path (DESIGN.md
            // decision 5) without requiring real network access in tests.
            "http://127.0.0.1:1/registry".to_string(),
            output_root.to_path_buf(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn happy_path_small_yields_success_with_combined_item_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let news_items: Vec<Item> = (1..=8).map(|n| item(&format!("known{n:03}"), Category::News)).collect();
        let news_status = CategoryCollectionStatus {
            per_source: vec![
                SourceStatus {
                    source_name: "feed-a".into(),
                    category: Category::News,
                    outcome: CollectionOutcome::Success,
                    item_count: 3,
                    message: None,
                },
                SourceStatus {
                    source_name: "feed-b".into(),
                    category: Category::News,
                    outcome: CollectionOutcome::Success,
                    item_count: 5,
                    message: None,
                },
            ],
            per_platform: Vec::new(),
            notice: None,
        };
        let news_report = CategoryReport {
            category: Category::News,
            items: news_items.clone(),
            themes: Vec::new(),
            category_summary: "news summary".into(),
            top_items: news_items.iter().take(5).cloned().collect(),
            item_count_total: 8,
            notice: None,
        };

        let gatherers: [Arc<dyn Gatherer>; 4] = [
            Arc::new(ScenarioGatherer { items: news_items, status: news_status }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
        ];
        let analyzers: [Arc<dyn Analyzer>; 4] = [
            Arc::new(ScenarioAnalyzer { report: news_report }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Research) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Social) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Community) }),
        ];
        let llm = Arc::new(ScriptedLlmClient { reasoning_unavailable: false, topic_item_id: "known001".to_string() });

        let orchestrator = build_test_orchestrator(gatherers, analyzers, llm, dir.path());
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let run_report = orchestrator.run(report_date).await.expect("run succeeds");

        assert_eq!(run_report.outcome, RunOutcome::Success);
        assert_eq!(run_report.report.categories["news"].item_count_total, 8);
        assert_eq!(
            run_report.report.collection_status.categories["news"].overall(),
            CollectionOutcome::Success
        );
        assert_eq!(run_report.report.collection_status.overall, Some(RunOutcome::Success));
        assert!(dir
            .path()
            .join("web/data")
            .join(report_date.to_string())
            .join("summary.json")
            .exists());
    }

    #[tokio::test]
    async fn weekend_preprint_gap_is_a_legitimate_zero_not_a_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let news_items = vec![item("known001", Category::News)];
        let news_report = CategoryReport {
            category: Category::News,
            items: news_items.clone(),
            themes: Vec::new(),
            category_summary: "news summary".into(),
            top_items: news_items.clone(),
            item_count_total: 1,
            notice: None,
        };
        let research_status = CategoryCollectionStatus {
            per_source: vec![SourceStatus {
                source_name: "cs.AI".into(),
                category: Category::Research,
                outcome: CollectionOutcome::Success,
                item_count: 0,
                message: None,
            }],
            per_platform: Vec::new(),
            notice: Some("no items — weekend".to_string()),
        };
        let research_report = CategoryReport {
            category: Category::Research,
            items: Vec::new(),
            themes: Vec::new(),
            category_summary: String::new(),
            top_items: Vec::new(),
            item_count_total: 0,
            notice: Some("no items — weekend".to_string()),
        };

        let gatherers: [Arc<dyn Gatherer>; 4] = [
            Arc::new(ScenarioGatherer {
                items: news_items,
                status: CategoryCollectionStatus::default(),
            }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: research_status }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
        ];
        let analyzers: [Arc<dyn Analyzer>; 4] = [
            Arc::new(ScenarioAnalyzer { report: news_report }),
            Arc::new(ScenarioAnalyzer { report: research_report }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Social) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Community) }),
        ];
        let llm = Arc::new(ScriptedLlmClient { reasoning_unavailable: false, topic_item_id: "known001".to_string() });

        let orchestrator = build_test_orchestrator(gatherers, analyzers, llm, dir.path());
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap(); // a Sunday
        let run_report = orchestrator.run(report_date).await.expect("run succeeds");

        let research = &run_report.report.categories["research"];
        assert_eq!(research.item_count_total, 0);
        assert_eq!(research.notice.as_deref(), Some("no items — weekend"));
        assert_eq!(
            run_report.report.collection_status.categories["research"].overall(),
            CollectionOutcome::Success
        );
        assert_eq!(run_report.outcome, RunOutcome::Success);
    }

    #[tokio::test]
    async fn dead_microblog_credential_skips_one_platform_without_failing_the_category() {
        let dir = tempfile::tempdir().expect("tempdir");
        let social_items = vec![
            item("known001", Category::Social),
            item("known002", Category::Social),
        ];
        let social_status = CategoryCollectionStatus {
            per_source: Vec::new(),
            per_platform: vec![
                PlatformStatus {
                    platform: "microblog".into(),
                    outcome: CollectionOutcome::Skipped,
                    item_count: 0,
                    message: Some("BRIEFING_MICROBLOG_API_KEY not set".into()),
                },
                PlatformStatus {
                    platform: "federated_microblog".into(),
                    outcome: CollectionOutcome::Success,
                    item_count: 1,
                    message: None,
                },
                PlatformStatus {
                    platform: "federated_longform".into(),
                    outcome: CollectionOutcome::Success,
                    item_count: 1,
                    message: None,
                },
            ],
            notice: None,
        };
        let social_report = CategoryReport {
            category: Category::Social,
            items: social_items.clone(),
            themes: Vec::new(),
            category_summary: "social summary".into(),
            top_items: social_items.clone(),
            item_count_total: 2,
            notice: None,
        };

        let gatherers: [Arc<dyn Gatherer>; 4] = [
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: social_items, status: social_status }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
        ];
        let analyzers: [Arc<dyn Analyzer>; 4] = [
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::News) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Research) }),
            Arc::new(ScenarioAnalyzer { report: social_report }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Community) }),
        ];
        let llm = Arc::new(ScriptedLlmClient { reasoning_unavailable: false, topic_item_id: "known001".to_string() });

        let orchestrator = build_test_orchestrator(gatherers, analyzers, llm, dir.path());
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let run_report = orchestrator.run(report_date).await.expect("run succeeds");

        let social_status = &run_report.report.collection_status.categories["social"];
        assert_eq!(social_status.overall(), CollectionOutcome::Success);
        assert!(social_status
            .per_platform
            .iter()
            .all(|p| p.outcome != CollectionOutcome::Failed));
        assert_eq!(run_report.outcome, RunOutcome::Success);
    }

    #[tokio::test]
    async fn reasoning_stripped_by_proxy_aborts_before_any_artifact_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gatherers: [Arc<dyn Gatherer>; 4] = [
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
        ];
        let analyzers: [Arc<dyn Analyzer>; 4] = [
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::News) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Research) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Social) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Community) }),
        ];
        let llm = Arc::new(ScriptedLlmClient { reasoning_unavailable: true, topic_item_id: "known001".to_string() });

        let orchestrator = build_test_orchestrator(gatherers, analyzers, llm, dir.path());
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();

        match orchestrator.run(report_date).await {
            Err(OrchestratorError::LlmUnavailable(LlmError::ReasoningUnavailable { mode, .. })) => {
                assert_eq!(mode, "proxy");
            }
            other => panic!("expected a fatal ReasoningUnavailable abort, got: {other:?}"),
        }
        assert!(!dir.path().join("web/data").join(report_date.to_string()).exists());
    }

    #[tokio::test]
    async fn partial_analyzer_failure_notice_and_fallback_summary_reach_the_day_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let news_items = vec![item("known001", Category::News)];
        let news_report = CategoryReport {
            category: Category::News,
            items: news_items.clone(),
            themes: Vec::new(),
            // The deterministic fallback a real MapReduceAnalyzer would
            // produce after its reduce call fails twice (see
            // analyze::tests::reduce_failure_falls_back_to_deterministic_summary).
            category_summary: "summary a".into(),
            top_items: news_items.clone(),
            item_count_total: 1,
            notice: Some("analysis degraded: one or more calls failed".to_string()),
        };

        let gatherers: [Arc<dyn Gatherer>; 4] = [
            Arc::new(ScenarioGatherer { items: news_items, status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
            Arc::new(ScenarioGatherer { items: Vec::new(), status: CategoryCollectionStatus::default() }),
        ];
        let analyzers: [Arc<dyn Analyzer>; 4] = [
            Arc::new(ScenarioAnalyzer { report: news_report }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Research) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Social) }),
            Arc::new(ScenarioAnalyzer { report: blank_report(Category::Community) }),
        ];
        let llm = Arc::new(ScriptedLlmClient { reasoning_unavailable: false, topic_item_id: "known001".to_string() });

        let orchestrator = build_test_orchestrator(gatherers, analyzers, llm, dir.path());
        let report_date = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let run_report = orchestrator.run(report_date).await.expect("run succeeds");

        let news = &run_report.report.categories["news"];
        assert_eq!(news.category_summary, "summary a");
        assert_eq!(news.notice.as_deref(), Some("analysis degraded: one or more calls failed"));
        assert!(dir
            .path()
            .join("web/data")
            .join(report_date.to_string())
            .join("summary.json")
            .exists());
    }
}
