//! Smart link extraction: asks the model which URLs mentioned in social
//! items are worth fetching as full news articles.

use crate::analyze::parse::parse_tolerant_json;
use crate::error::LlmError;
use crate::llm::{LlmClient, ReasoningBudget};
use crate::model::Item;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

const BATCH_SIZE: usize = 40;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)\]\"']+").expect("url regex must compile"))
}

#[derive(Deserialize)]
struct LinkSelection {
    #[serde(default)]
    worth_fetching: Vec<String>,
}

/// Collect candidate URLs from a batch of social items' content/metadata,
/// then ask the model which are worth fetching as news articles. Returns
/// an empty `Vec` on any call or parse failure except
/// `LlmError::ReasoningUnavailable`, which is fatal by contract and
/// propagated so the orchestrator can abort the run without writing
/// artifacts.
pub async fn extract_links_for_fetch(
    posts: &[Item],
    llm: &dyn LlmClient,
) -> Result<Vec<String>, LlmError> {
    let mut candidates = Vec::new();
    for post in posts {
        for m in url_re().find_iter(&post.content) {
            candidates.push(m.as_str().to_string());
        }
    }
    candidates.sort();
    candidates.dedup();

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut approved = Vec::new();
    for batch in candidates.chunks(BATCH_SIZE) {
        let prompt = link_prompt(batch);
        let system = "You triage URLs mentioned in social posts for an AI/ML news briefing, selecting only links worth fetching as standalone news articles (skip ads, trackers, image/video hosts, and generic homepages).";

        let response = match llm
            .call_with_reasoning(system, &prompt, ReasoningBudget::Quick, "links:triage")
            .await
        {
            Ok(response) => response,
            Err(e @ LlmError::ReasoningUnavailable { .. }) => return Err(e),
            Err(_) => continue,
        };
        if let Some(selection) = parse_tolerant_json::<LinkSelection>(&response.text) {
            approved.extend(
                selection
                    .worth_fetching
                    .into_iter()
                    .filter(|u| batch.contains(u)),
            );
        }
    }
    approved.sort();
    approved.dedup();
    Ok(approved)
}

fn link_prompt(batch: &[String]) -> String {
    let mut out = String::from(
        "From the URLs below, return a JSON object {\"worth_fetching\": [...]} in a ```json fenced block, listing only the URLs that link to a standalone news article.\n\n",
    );
    for url in batch {
        out.push_str(url);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_re_extracts_urls_from_mixed_text() {
        let text = "check this out https://example.com/a and also https://example.com/b.";
        let found: Vec<_> = url_re().find_iter(text).map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["https://example.com/a", "https://example.com/b."]);
    }

    #[tokio::test]
    async fn extract_links_for_fetch_returns_empty_when_no_urls_present() {
        use crate::llm::LlmResponse;
        struct NoCallLlm;
        #[async_trait::async_trait]
        impl LlmClient for NoCallLlm {
            async fn call_with_reasoning(
                &self,
                _system: &str,
                _user: &str,
                _budget: ReasoningBudget,
                _phase: &str,
            ) -> Result<LlmResponse, crate::error::LlmError> {
                panic!("should not be called when there are no candidate URLs");
            }
        }
        let posts = vec![];
        let result = extract_links_for_fetch(&posts, &NoCallLlm).await.expect("no LLM call made");
        assert!(result.is_empty());
    }
}
