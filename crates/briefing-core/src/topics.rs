//! Cross-category topic synthesis: a single Ultra-budget call fusing all
//! four category reports into a small set of cross-cutting topics.

use crate::analyze::parse::parse_tolerant_json;
use crate::ecosystem::EcosystemContext;
use crate::error::LlmError;
use crate::llm::{LlmClient, ReasoningBudget};
use crate::model::{Category, CategoryReport, Topic};
use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

const TOP_K_PER_CATEGORY: usize = 15;

#[derive(Deserialize)]
struct RawTopic {
    title: String,
    description: String,
    #[serde(default)]
    item_ids: Vec<String>,
}

/// Fuse four per-category reports into a small set of cross-cutting topics.
/// Returns an empty `Vec` on any call or parse failure except
/// `LlmError::ReasoningUnavailable`, which is fatal by contract and
/// propagated so the orchestrator can abort the run without writing
/// artifacts.
pub async fn synthesize_topics(
    reports: &[CategoryReport; 4],
    grounding: &EcosystemContext,
    llm: &dyn LlmClient,
) -> Result<Vec<Topic>, LlmError> {
    let prompt = build_prompt(reports);
    let system = format!(
        "{}\n\nYou find 3-6 cross-cutting topics that span multiple categories of an AI/ML daily briefing.",
        grounding.grounding_text()
    );

    let response = match llm
        .call_with_reasoning(&system, &prompt, ReasoningBudget::Ultra, "topics:synthesize")
        .await
    {
        Ok(response) => response,
        Err(e @ LlmError::ReasoningUnavailable { .. }) => return Err(e),
        Err(_) => return Ok(Vec::new()),
    };

    let Some(raw_topics) = parse_tolerant_json::<Vec<RawTopic>>(&response.text) else {
        return Ok(Vec::new());
    };

    let index = build_item_index(reports);

    let mut topics: Vec<Topic> = raw_topics
        .into_iter()
        .filter_map(|raw| {
            let referenced_item_ids: Vec<String> = raw
                .item_ids
                .into_iter()
                .filter(|id| index.contains_key(id.as_str()))
                .collect();
            if referenced_item_ids.is_empty() {
                return None;
            }
            let mut category_mix: HashMap<Category, usize> = HashMap::new();
            for id in &referenced_item_ids {
                if let Some(category) = index.get(id.as_str()) {
                    *category_mix.entry(*category).or_insert(0) += 1;
                }
            }
            Some(Topic {
                title: raw.title,
                description: raw.description,
                category_mix,
                referenced_item_ids,
            })
        })
        .collect();

    topics.sort_by(|a, b| {
        let entropy_a = shannon_entropy(&a.category_mix);
        let entropy_b = shannon_entropy(&b.category_mix);
        entropy_cmp(entropy_b, entropy_a)
            .then_with(|| Reverse(a.referenced_item_ids.len()).cmp(&Reverse(b.referenced_item_ids.len())))
    });

    Ok(topics)
}

fn build_prompt(reports: &[CategoryReport; 4]) -> String {
    let mut out = String::from(
        "Given the following per-category items, return a JSON array of topics in a ```json fenced block, each shaped {\"title\": ..., \"description\": ..., \"item_ids\": [...]}.\n\n",
    );
    for report in reports {
        out.push_str(&format!("## {}\n", report.category.as_str()));
        for item in report.top_items.iter().take(TOP_K_PER_CATEGORY) {
            out.push_str(&format!("id: {}\ntitle: {}\n\n", item.id, item.title));
        }
    }
    out
}

fn build_item_index(reports: &[CategoryReport; 4]) -> HashMap<&str, Category> {
    let mut index = HashMap::new();
    for report in reports {
        for item in &report.items {
            index.insert(item.id.as_str(), report.category);
        }
    }
    index
}

/// Shannon entropy (base 2) over the normalized category-count distribution.
fn shannon_entropy(category_mix: &HashMap<Category, usize>) -> f64 {
    let total: usize = category_mix.values().sum();
    if total == 0 {
        return 0.0;
    }
    category_mix
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            if p > 0.0 {
                -p * p.log2()
            } else {
                0.0
            }
        })
        .sum()
}

/// Epsilon-tolerant ordering between two entropy values, avoiding a panic on
/// `partial_cmp().unwrap()` (entropy can never be NaN here since the mix is
/// never empty post-filter, but this stays defensive regardless).
fn entropy_cmp(a: f64, b: f64) -> std::cmp::Ordering {
    const EPSILON: f64 = 1e-9;
    if (a - b).abs() < EPSILON {
        std::cmp::Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix(pairs: &[(Category, usize)]) -> HashMap<Category, usize> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn shannon_entropy_is_zero_for_single_category() {
        let m = mix(&[(Category::News, 5)]);
        assert_eq!(shannon_entropy(&m), 0.0);
    }

    #[test]
    fn shannon_entropy_is_higher_for_more_even_mix() {
        let even = mix(&[(Category::News, 2), (Category::Research, 2)]);
        let skewed = mix(&[(Category::News, 9), (Category::Research, 1)]);
        assert!(shannon_entropy(&even) > shannon_entropy(&skewed));
    }

    #[test]
    fn entropy_cmp_treats_near_equal_values_as_equal() {
        assert_eq!(entropy_cmp(1.0000000001, 1.0000000002), std::cmp::Ordering::Equal);
    }

    #[test]
    fn entropy_cmp_orders_distinct_values() {
        assert_eq!(entropy_cmp(0.5, 1.5), std::cmp::Ordering::Less);
    }
}
