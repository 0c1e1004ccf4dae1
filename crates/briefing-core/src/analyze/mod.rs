//! Per-category map-reduce analysis over gathered items.

pub mod parse;

use crate::ecosystem::EcosystemContext;
use crate::error::LlmError;
use crate::llm::{LlmClient, ReasoningBudget};
use crate::model::{Category, CategoryReport, Item, Theme};
use parse::parse_tolerant_json;
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Capability implemented by the single analyzer behind every category.
/// Non-fatal per-call failures are folded into the returned
/// `CategoryReport` as a `partial` notice; `LlmError::ReasoningUnavailable`
/// is fatal by contract and propagated as `Err` so the orchestrator can
/// abort the run without writing artifacts.
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, items: &[Item], grounding: &EcosystemContext) -> Result<CategoryReport, LlmError>;
}

/// Map-reduce analyzer shared by all four categories; behavior varies only
/// through the `category` tag and the item set passed to `analyze`, per the
/// capability-polymorphism redesign note.
pub struct MapReduceAnalyzer {
    llm: Arc<dyn LlmClient>,
    category: Category,
    batch_size: usize,
    concurrency: usize,
    top_k: usize,
}

impl MapReduceAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, category: Category) -> Self {
        Self {
            llm,
            category,
            batch_size: 75,
            concurrency: 4,
            top_k: 30,
        }
    }

    pub fn with_tuning(mut self, batch_size: usize, concurrency: usize, top_k: usize) -> Self {
        self.batch_size = batch_size;
        self.concurrency = concurrency;
        self.top_k = top_k;
        self
    }
}

#[derive(Deserialize)]
struct MapItemResult {
    id: String,
    summary: String,
    score: u8,
    #[serde(default)]
    themes: Vec<String>,
}

#[derive(Deserialize)]
struct MapBatchResponse {
    items: Vec<MapItemResult>,
}

#[derive(Deserialize)]
struct ReduceResponse {
    themes: Vec<Theme>,
    category_summary: String,
    /// Item ids in desired rank order, most important first.
    #[serde(default)]
    ranking: Vec<String>,
}

async fn run_map_batch(
    llm: &dyn LlmClient,
    grounding: &EcosystemContext,
    category: Category,
    batch: &[Item],
) -> Result<Option<HashMap<String, MapItemResult>>, LlmError> {
    let prompt = map_prompt(batch);
    let system = format!(
        "{}\n\nYou are scoring and summarizing {} items for a daily AI/ML briefing.",
        grounding.grounding_text(),
        category.as_str()
    );

    for _attempt in 0..2 {
        let phase = format!("map:{}", category.as_str());
        let response = match llm
            .call_with_reasoning(&system, &prompt, ReasoningBudget::Quick, &phase)
            .await
        {
            Ok(response) => response,
            Err(e @ LlmError::ReasoningUnavailable { .. }) => return Err(e),
            Err(_) => continue,
        };
        if let Some(parsed) = parse_tolerant_json::<MapBatchResponse>(&response.text) {
            return Ok(Some(parsed.items.into_iter().map(|r| (r.id.clone(), r)).collect()));
        }
    }
    Ok(None)
}

fn map_prompt(batch: &[Item]) -> String {
    let mut out = String::from(
        "For each item below, return a JSON object {\"items\": [{\"id\": ..., \"summary\": ..., \"score\": 0-100, \"themes\": [...]}]} in a ```json fenced block.\n\n",
    );
    for item in batch {
        out.push_str(&format!(
            "id: {}\ntitle: {}\ncontent: {}\n\n",
            item.id,
            item.title,
            item.content.chars().take(600).collect::<String>()
        ));
    }
    out
}

fn reduce_prompt(category: Category, scored: &[Item]) -> String {
    let mut out = format!(
        "Given these scored {} items, return a JSON object {{\"themes\": [{{\"name\":..., \"item_count\":..., \"description\":...}}], \"category_summary\": \"...\", \"ranking\": [\"id\", ...]}} in a ```json fenced block. Produce between 3 and 7 themes.\n\n",
        category.as_str()
    );
    for item in scored {
        out.push_str(&format!(
            "id: {} | score: {} | summary: {}\n",
            item.id,
            item.score,
            item.per_item_summary.as_deref().unwrap_or(&item.title)
        ));
    }
    out
}

async fn run_reduce(
    llm: &dyn LlmClient,
    grounding: &EcosystemContext,
    category: Category,
    scored: &[Item],
) -> Result<Option<ReduceResponse>, LlmError> {
    let prompt = reduce_prompt(category, scored);
    let system = grounding.grounding_text();
    let phase = format!("reduce:{}", category.as_str());

    for _attempt in 0..2 {
        let response = match llm
            .call_with_reasoning(&system, &prompt, ReasoningBudget::Deep, &phase)
            .await
        {
            Ok(response) => response,
            Err(e @ LlmError::ReasoningUnavailable { .. }) => return Err(e),
            Err(_) => continue,
        };
        if let Some(parsed) = parse_tolerant_json::<ReduceResponse>(&response.text) {
            return Ok(Some(parsed));
        }
    }
    Ok(None)
}

/// `source_kind` preference (preprint > rss > forum > microblog/api), then
/// engagement (parsed from `metadata["engagement"]`, default 0, descending),
/// then `collected_at` ascending (earlier wins).
fn tie_break_key(item: &Item) -> (u8, Reverse<u64>, chrono::DateTime<chrono::Utc>) {
    let engagement: u64 = item
        .metadata
        .get("engagement")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    (item.source_kind.tie_break_rank(), Reverse(engagement), item.collected_at)
}

fn rank_items(mut items: Vec<Item>, ranking: &[String]) -> Vec<Item> {
    let position: HashMap<&str, usize> = ranking
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    items.sort_by(|a, b| {
        match (position.get(a.id.as_str()), position.get(b.id.as_str())) {
            (Some(pa), Some(pb)) => pa.cmp(pb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => tie_break_key(a).cmp(&tie_break_key(b)),
        }
    });
    items
}

#[async_trait::async_trait]
impl Analyzer for MapReduceAnalyzer {
    async fn analyze(&self, items: &[Item], grounding: &EcosystemContext) -> Result<CategoryReport, LlmError> {
        if items.is_empty() {
            return Ok(CategoryReport {
                category: self.category,
                items: Vec::new(),
                themes: Vec::new(),
                category_summary: String::new(),
                top_items: Vec::new(),
                item_count_total: 0,
                notice: Some("no items for this category".to_string()),
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let batches: Vec<Vec<Item>> = items.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        let mut handles = Vec::with_capacity(batches.len());

        for batch in batches {
            let llm = self.llm.clone();
            let semaphore = semaphore.clone();
            let category = self.category;
            let grounding = grounding.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let results = run_map_batch(llm.as_ref(), &grounding, category, &batch).await;
                (batch, results)
            }));
        }

        let mut scored: Vec<Item> = Vec::with_capacity(items.len());
        let mut any_batch_failed = false;
        for handle in handles {
            let (batch, results) = handle.await.unwrap_or((Vec::new(), Ok(None)));
            match results? {
                Some(map) => {
                    for mut item in batch {
                        if let Some(result) = map.get(&item.id) {
                            item.score = result.score.min(100);
                            item.per_item_summary = Some(result.summary.clone());
                            item.themes_tags = result.themes.clone();
                        }
                        scored.push(item);
                    }
                }
                None => {
                    any_batch_failed = true;
                    scored.extend(batch);
                }
            }
        }

        let reduce_result = run_reduce(self.llm.as_ref(), grounding, self.category, &scored).await?;

        let (themes, category_summary, ranked, partial) = match reduce_result {
            Some(reduced) => (
                reduced.themes,
                reduced.category_summary,
                rank_items(scored, &reduced.ranking),
                any_batch_failed,
            ),
            None => {
                let fallback_summary = fallback_category_summary(self.category, &scored);
                (Vec::new(), fallback_summary, rank_items(scored, &[]), true)
            }
        };

        let top_items: Vec<Item> = ranked.iter().take(self.top_k).cloned().collect();
        let item_count_total = ranked.len();

        Ok(CategoryReport {
            category: self.category,
            items: ranked,
            themes,
            category_summary,
            top_items,
            item_count_total,
            notice: partial.then(|| "analysis degraded: one or more calls failed".to_string()),
        })
    }
}

/// Deterministic fallback used when the reduce call fails twice: join each
/// item's map-phase summary (or title, if the map phase also failed) rather
/// than invoking the model again.
fn fallback_category_summary(category: Category, items: &[Item]) -> String {
    if items.is_empty() {
        return format!("No {} items were gathered in this run.", category.as_str());
    }
    let mut top: Vec<&Item> = items.iter().collect();
    top.sort_by(|a, b| b.score.cmp(&a.score));
    top.truncate(5);
    top.iter()
        .map(|i| i.per_item_summary.as_deref().unwrap_or(&i.title))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::LlmResponse;
    use crate::model::SourceKind;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct ScriptedLlm {
        responses: TokioMutex<Vec<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: TokioMutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn scripted_failure() -> LlmError {
            LlmError::Api { status: 500, message: "scripted failure".into() }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        async fn call_with_reasoning(
            &self,
            _system: &str,
            _user: &str,
            _budget: ReasoningBudget,
            _phase: &str,
        ) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.responses.lock().await;
            if guard.is_empty() {
                return Err(LlmError::Api { status: 500, message: "exhausted script".into() });
            }
            match guard.remove(0) {
                Ok(text) => Ok(LlmResponse {
                    text,
                    reasoning_blocks: vec!["thinking".to_string()],
                    usage: Default::default(),
                }),
                Err(e) => Err(e),
            }
        }
    }

    fn item(id: &str, title: &str) -> Item {
        Item {
            id: id.to_string(),
            category: Category::News,
            source_name: "test".into(),
            source_kind: SourceKind::Rss,
            url: format!("https://example.com/{id}"),
            title: title.to_string(),
            content: "some content".into(),
            author: None,
            published_at: Utc::now(),
            collected_at: Utc::now(),
            metadata: Default::default(),
            score: 0,
            per_item_summary: None,
            themes_tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn happy_path_scores_and_ranks_items() {
        let map_response = r#"```json
        {"items": [
            {"id": "a", "summary": "summary a", "score": 90, "themes": ["x"]},
            {"id": "b", "summary": "summary b", "score": 10, "themes": ["y"]}
        ]}
        ```"#;
        let reduce_response = r#"```json
        {"themes": [{"name": "X", "item_count": 1, "description": "d"}],
         "category_summary": "overall summary",
         "ranking": ["a", "b"]}
        ```"#;

        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(map_response.to_string()),
            Ok(reduce_response.to_string()),
        ]));
        let analyzer = MapReduceAnalyzer::new(llm, Category::News);
        let grounding = EcosystemContext::empty();

        let items = vec![item("a", "Title A"), item("b", "Title B")];
        let report = analyzer.analyze(&items, &grounding).await.expect("analyze succeeds");

        assert_eq!(report.item_count_total, 2);
        assert_eq!(report.top_items[0].id, "a");
        assert_eq!(report.top_items[0].score, 90);
        assert_eq!(report.category_summary, "overall summary");
        assert!(report.notice.is_none());
    }

    #[tokio::test]
    async fn reduce_failure_falls_back_to_deterministic_summary() {
        let map_response = r#"```json
        {"items": [{"id": "a", "summary": "summary a", "score": 80, "themes": []}]}
        ```"#;

        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(map_response.to_string()),
            Err(ScriptedLlm::scripted_failure()),
            Err(ScriptedLlm::scripted_failure()),
        ]));
        let analyzer = MapReduceAnalyzer::new(llm, Category::News);
        let grounding = EcosystemContext::empty();

        let items = vec![item("a", "Title A")];
        let report = analyzer.analyze(&items, &grounding).await.expect("analyze succeeds");

        assert_eq!(report.category_summary, "summary a");
        assert!(report.notice.is_some());
    }

    #[tokio::test]
    async fn empty_items_produce_zero_count_report_with_notice() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let analyzer = MapReduceAnalyzer::new(llm, Category::Research);
        let grounding = EcosystemContext::empty();

        let report = analyzer.analyze(&[], &grounding).await.expect("analyze succeeds");
        assert_eq!(report.item_count_total, 0);
        assert!(report.notice.is_some());
    }

    #[tokio::test]
    async fn reasoning_unavailable_propagates_as_fatal_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::ReasoningUnavailable {
            mode: "direct".to_string(),
            remediation: "check model supports extended thinking".to_string(),
        })]));
        let analyzer = MapReduceAnalyzer::new(llm, Category::News);
        let grounding = EcosystemContext::empty();

        let items = vec![item("a", "Title A")];
        let result = analyzer.analyze(&items, &grounding).await;

        assert!(matches!(result, Err(LlmError::ReasoningUnavailable { .. })));
    }

    #[test]
    fn rank_items_falls_back_to_tie_break_for_unranked_items() {
        let mut a = item("a", "A");
        a.source_kind = SourceKind::Rss;
        let mut b = item("b", "B");
        b.source_kind = SourceKind::Preprint;

        let ranked = rank_items(vec![a, b], &[]);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn themes_item_count_never_exceeds_total_items() {
        let themes = vec![
            Theme { name: "t1".into(), item_count: 2, description: "d".into() },
            Theme { name: "t2".into(), item_count: 1, description: "d".into() },
        ];
        let total: usize = themes.iter().map(|t| t.item_count).sum();
        assert!(total <= 3);
    }
}
