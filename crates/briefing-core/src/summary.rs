//! Executive summary and link enrichment: two sequential Deep-budget calls
//! over the four category reports and the synthesized topics.

use crate::error::SummaryError;
use crate::llm::{LlmClient, ReasoningBudget};
use crate::model::{Category, CategoryReport, Topic};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/\?date=(?P<date>\d{4}-\d{2}-\d{2})&category=(?P<category>[a-z]+)#item-(?P<id>[A-Za-z0-9]+)")
            .expect("anchor regex must compile")
    })
}

/// One Deep-budget call producing executive summary prose from the four
/// category reports and the synthesized cross-category topics.
pub async fn executive_summary(
    reports: &[CategoryReport; 4],
    topics: &[Topic],
    llm: &dyn LlmClient,
) -> Result<String, SummaryError> {
    let prompt = summary_prompt(reports, topics);
    let system = "You write the executive summary paragraphs for a daily AI/ML briefing, in clear prose with no markdown headers.";

    let response = llm
        .call_with_reasoning(system, &prompt, ReasoningBudget::Deep, "summary:executive")
        .await?;
    Ok(response.text)
}

fn summary_prompt(reports: &[CategoryReport; 4], topics: &[Topic]) -> String {
    let mut out = String::from(
        "Write executive summary paragraphs for today's AI/ML briefing given these category summaries and cross-cutting topics.\n\n",
    );
    for report in reports {
        out.push_str(&format!(
            "## {}\n{}\n\n",
            report.category.as_str(),
            report.category_summary
        ));
    }
    if !topics.is_empty() {
        out.push_str("## Cross-cutting topics\n");
        for topic in topics {
            out.push_str(&format!("- {}: {}\n", topic.title, topic.description));
        }
    }
    out
}

/// Deterministic fallback used when `executive_summary` fails: joins each
/// category's summary with a fixed separator. No LLM, no randomness —
/// byte-for-byte reproducible given the same category summaries.
pub fn fallback_summary(reports: &[CategoryReport; 4]) -> String {
    reports
        .iter()
        .map(|r| format!("{}: {}", r.category.as_str(), r.category_summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One further Deep-budget call inserting `/?date=...&category=...#item-...`
/// anchors into `summary`. Every emitted anchor is validated against
/// `report_date` and the category/item index; anchors that fail validation
/// are stripped back to plain text rather than discarding the whole
/// enrichment.
pub async fn enrich_links(
    summary: &str,
    reports: &[CategoryReport; 4],
    report_date: NaiveDate,
    llm: &dyn LlmClient,
) -> Result<String, SummaryError> {
    let prompt = enrich_prompt(summary, reports);
    let system = "You insert internal anchor links of the form /?date=YYYY-MM-DD&category=<category>#item-<id> around phrases referencing specific items. Only use ids that appear in the provided item lists.";

    let response = llm
        .call_with_reasoning(system, &prompt, ReasoningBudget::Deep, "summary:enrich")
        .await?;

    Ok(strip_invalid_anchors(&response.text, reports, report_date))
}

fn enrich_prompt(summary: &str, reports: &[CategoryReport; 4]) -> String {
    let mut out = format!("Summary:\n{summary}\n\nAvailable items by category:\n");
    for report in reports {
        out.push_str(&format!("## {}\n", report.category.as_str()));
        for item in &report.items {
            out.push_str(&format!("id: {}\ntitle: {}\n", item.id, item.title));
        }
    }
    out
}

/// Strip any anchor whose date, category, or item id does not validate,
/// leaving the surrounding prose text intact.
fn strip_invalid_anchors(text: &str, reports: &[CategoryReport; 4], report_date: NaiveDate) -> String {
    let mut valid_ids: std::collections::HashMap<Category, HashSet<&str>> = std::collections::HashMap::new();
    for report in reports {
        let set = valid_ids.entry(report.category).or_default();
        for item in &report.items {
            set.insert(item.id.as_str());
        }
    }
    let report_date_str = report_date.format("%Y-%m-%d").to_string();

    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in anchor_re().captures_iter(text) {
        let whole = caps.get(0).expect("capture group 0 always present");
        out.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        let date_ok = &caps["date"] == report_date_str.as_str();
        let category: Option<Category> = caps["category"].parse().ok();
        let id = &caps["id"];
        let id_ok = category
            .and_then(|c| valid_ids.get(&c))
            .map(|ids| ids.contains(id))
            .unwrap_or(false);

        if date_ok && id_ok {
            out.push_str(whole.as_str());
        }
        // invalid anchor: dropped, surrounding prose kept via last_end advance
    }
    out.push_str(&text[last_end..]);
    out
}
