//! Ecosystem release timeline: curated entries merged with an external
//! registry, rendered into a grounding text block shared read-only across
//! every analysis/synthesis/summary call after phase 0.

use crate::analyze::parse::parse_tolerant_json;
use crate::error::EcosystemError;
use crate::http::{HostPolicy, HttpPool};
use crate::llm::{LlmClient, ReasoningBudget};
use crate::model::{EcosystemRelease, Item, ReleaseSource};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// The minimum confidence a phase-4.6-detected release must carry before it
/// is appended to the curated file.
pub const AUTO_DETECT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Abstracts the external release registry so tests can substitute a fixed
/// fixture instead of a real network fetch.
#[async_trait::async_trait]
pub trait RegistryClient: Send + Sync {
    async fn fetch(&self) -> Vec<EcosystemRelease>;
}

/// Fetches the external registry over the shared HTTP pool. A fetch failure
/// degrades to an empty list rather than propagating — ecosystem loading is
/// never fatal to the run (see DESIGN.md's open-question resolution).
pub struct HttpRegistryClient {
    http: Arc<HttpPool>,
    url: String,
}

impl HttpRegistryClient {
    pub fn new(http: Arc<HttpPool>, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait::async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn fetch(&self) -> Vec<EcosystemRelease> {
        let host = reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone());

        let result = self
            .http
            .execute(&host, HostPolicy::default(), || self.http.client().get(&self.url))
            .await;

        let Ok(response) = result else {
            tracing::warn!(url = %self.url, "ecosystem registry fetch failed, continuing curated-only");
            return Vec::new();
        };
        if !response.status().is_success() {
            tracing::warn!(url = %self.url, status = %response.status(), "ecosystem registry returned non-success status");
            return Vec::new();
        }
        match response.json::<Vec<EcosystemRelease>>().await {
            Ok(releases) => releases,
            Err(e) => {
                tracing::warn!(error = %e, "ecosystem registry response failed to parse");
                Vec::new()
            }
        }
    }
}

/// The merged, shared grounding document: curated releases merged with the
/// external registry by `(vendor, model_name)`, preferring the
/// higher-confidence entry on conflict.
#[derive(Debug, Clone, Default)]
pub struct EcosystemContext {
    releases: Vec<EcosystemRelease>,
}

impl EcosystemContext {
    /// An empty context, used when no curated file exists yet or in tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the curated file (missing file ⇒ empty curated set, matching
    /// the teacher's NotFound-tolerant config-load idiom) and merge in the
    /// registry's entries.
    pub async fn load(
        curated_path: &Path,
        registry: &dyn RegistryClient,
    ) -> Result<Self, EcosystemError> {
        let curated = load_curated(curated_path)?;
        let external = registry.fetch().await;
        Ok(Self::merge(curated, external))
    }

    fn merge(curated: Vec<EcosystemRelease>, external: Vec<EcosystemRelease>) -> Self {
        let mut by_key: std::collections::HashMap<(String, String), EcosystemRelease> =
            std::collections::HashMap::new();

        for release in curated.into_iter().chain(external) {
            let key = (release.vendor.clone(), release.model_name.clone());
            match by_key.get(&key) {
                Some(existing) if existing.confidence >= release.confidence => {}
                _ => {
                    by_key.insert(key, release);
                }
            }
        }

        let mut releases: Vec<EcosystemRelease> = by_key.into_values().collect();
        releases.sort_by(|a, b| {
            a.api_availability_date
                .cmp(&b.api_availability_date)
                .then_with(|| a.vendor.cmp(&b.vendor))
        });
        Self { releases }
    }

    /// Render a compact, deterministically-ordered text block for use as
    /// system context in every downstream LLM call.
    pub fn grounding_text(&self) -> String {
        if self.releases.is_empty() {
            return "Known AI/ML release timeline: (none loaded).".to_string();
        }
        let mut out = String::from("Known AI/ML release timeline:\n");
        for release in &self.releases {
            out.push_str(&format!(
                "- {} {}: GA {}, API {} (confidence {:.2}, source {:?})\n",
                release.vendor,
                release.model_name,
                release.general_availability_date.map_or("unknown".to_string(), |d| d.to_string()),
                release.api_availability_date.map_or("unknown".to_string(), |d| d.to_string()),
                release.confidence,
                release.source,
            ));
        }
        out
    }

    pub fn releases(&self) -> &[EcosystemRelease] {
        &self.releases
    }

    /// Phase-4.6 enrichment: ask the model whether the day's items reference
    /// any release not already in the timeline. Only high-confidence
    /// candidates are returned; the caller is responsible for appending them
    /// to the curated file (never an in-place edit).
    pub async fn detect_new_releases(&self, items: &[Item], llm: &dyn LlmClient) -> Vec<EcosystemRelease> {
        if items.is_empty() {
            return Vec::new();
        }
        let prompt = detect_prompt(items, &self.grounding_text());
        let Ok(response) = llm
            .call_with_reasoning(
                "You track AI/ML model and product releases.",
                &prompt,
                ReasoningBudget::Standard,
                "ecosystem:detect",
            )
            .await
        else {
            return Vec::new();
        };

        let Some(candidates) = parse_tolerant_json::<Vec<DetectedRelease>>(&response.text) else {
            return Vec::new();
        };

        candidates
            .into_iter()
            .filter(|c| c.confidence >= AUTO_DETECT_CONFIDENCE_THRESHOLD)
            .map(|c| EcosystemRelease {
                vendor: c.vendor,
                model_name: c.model_name,
                general_availability_date: c.general_availability_date,
                api_availability_date: c.api_availability_date,
                confidence: c.confidence,
                source: ReleaseSource::AutoDetected,
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct DetectedRelease {
    vendor: String,
    model_name: String,
    #[serde(default)]
    general_availability_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    api_availability_date: Option<chrono::NaiveDate>,
    confidence: f64,
}

fn detect_prompt(items: &[Item], grounding_text: &str) -> String {
    let mut out = format!(
        "{grounding_text}\n\nGiven today's gathered item titles below, list any AI/ML model or product releases referenced that are NOT already in the timeline above. Return a JSON array of {{\"vendor\":..., \"model_name\":..., \"general_availability_date\": \"YYYY-MM-DD\"|null, \"api_availability_date\": \"YYYY-MM-DD\"|null, \"confidence\": 0.0-1.0}} in a ```json fenced block. Return an empty array if there is nothing new.\n\n"
    );
    for item in items {
        out.push_str(&format!("- {}\n", item.title));
    }
    out
}

fn load_curated(path: &Path) -> Result<Vec<EcosystemRelease>, EcosystemError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|source| EcosystemError::ParseFailed {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(EcosystemError::ReadFailed {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Append `new_releases` to the curated file, never mutating existing
/// entries. Uses the same write-temp-then-rename atomic pattern as the
/// orchestrator's artifact writes.
pub fn append_curated_releases(
    path: &Path,
    new_releases: &[EcosystemRelease],
) -> Result<(), EcosystemError> {
    if new_releases.is_empty() {
        return Ok(());
    }

    let mut existing = load_curated(path)?;
    existing.extend(new_releases.iter().cloned());

    let serialized = serde_json::to_string_pretty(&existing).expect("EcosystemRelease always serializes");

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &serialized).map_err(|source| EcosystemError::WriteFailed { source })?;
    std::fs::rename(&tmp_path, path).map_err(|source| EcosystemError::WriteFailed { source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::LlmResponse;
    use crate::model::{Category, SourceKind};
    use chrono::{NaiveDate, Utc};

    struct FixedRegistry(Vec<EcosystemRelease>);

    #[async_trait::async_trait]
    impl RegistryClient for FixedRegistry {
        async fn fetch(&self) -> Vec<EcosystemRelease> {
            self.0.clone()
        }
    }

    struct StaticLlm(String);

    #[async_trait::async_trait]
    impl LlmClient for StaticLlm {
        async fn call_with_reasoning(
            &self,
            _system: &str,
            _user: &str,
            _budget: ReasoningBudget,
            _phase: &str,
        ) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                text: self.0.clone(),
                reasoning_blocks: vec!["thinking".to_string()],
                usage: Default::default(),
            })
        }
    }

    fn release(vendor: &str, model: &str, confidence: f64, source: ReleaseSource) -> EcosystemRelease {
        EcosystemRelease {
            vendor: vendor.to_string(),
            model_name: model.to_string(),
            general_availability_date: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            api_availability_date: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            confidence,
            source,
        }
    }

    #[test]
    fn merge_prefers_higher_confidence_on_conflict() {
        let curated = vec![release("Acme", "Model-1", 0.5, ReleaseSource::Curated)];
        let external = vec![release("Acme", "Model-1", 0.9, ReleaseSource::ExternalRegistry)];
        let ctx = EcosystemContext::merge(curated, external);
        assert_eq!(ctx.releases().len(), 1);
        assert!((ctx.releases()[0].confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_context_renders_placeholder_text() {
        let ctx = EcosystemContext::empty();
        assert!(ctx.grounding_text().contains("none loaded"));
    }

    #[tokio::test]
    async fn detect_new_releases_filters_by_confidence_threshold() {
        let body = r#"```json
        [
            {"vendor": "Acme", "model_name": "High", "confidence": 0.9},
            {"vendor": "Acme", "model_name": "Low", "confidence": 0.3}
        ]
        ```"#;
        let llm = StaticLlm(body.to_string());
        let ctx = EcosystemContext::empty();
        let item = Item {
            id: "abc123456789".into(),
            category: Category::News,
            source_name: "test".into(),
            source_kind: SourceKind::Rss,
            url: "https://example.com".into(),
            title: "Acme ships High".into(),
            content: String::new(),
            author: None,
            published_at: Utc::now(),
            collected_at: Utc::now(),
            metadata: Default::default(),
            score: 0,
            per_item_summary: None,
            themes_tags: Vec::new(),
        };

        let detected = ctx.detect_new_releases(&[item], &llm).await;
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].model_name, "High");
        assert_eq!(detected[0].source, ReleaseSource::AutoDetected);
    }

    #[test]
    fn append_curated_releases_is_append_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ecosystem.json");
        std::fs::write(&path, serde_json::to_string(&vec![release("A", "One", 1.0, ReleaseSource::Curated)]).unwrap())
            .expect("write initial");

        append_curated_releases(&path, &[release("B", "Two", 0.9, ReleaseSource::AutoDetected)]).expect("append");

        let written = load_curated(&path).expect("load");
        assert_eq!(written.len(), 2);
        assert!(written.iter().any(|r| r.model_name == "One"));
        assert!(written.iter().any(|r| r.model_name == "Two"));
    }

    #[test]
    fn load_curated_missing_file_is_empty_not_error() {
        let releases = load_curated(Path::new("/nonexistent/ecosystem.json")).expect("load");
        assert!(releases.is_empty());
    }
}
