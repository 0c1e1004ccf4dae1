//! RSS-sourced news gatherer, plus ingestion of smart-link-extracted
//! articles surfaced from the social gatherer's output.

use super::{dedup_first_occurrence, in_window, Gatherer};
use crate::fingerprint::{fingerprint_id, normalize_url};
use crate::http::{HostPolicy, HttpPool};
use crate::model::{
    Category, CategoryCollectionStatus, CollectionOutcome, CoverageWindow, Item, Source,
    SourceKind, SourceStatus,
};
use crate::sanitize::{sanitize_to_plain_text, truncate_payload};
use chrono::Utc;
use std::sync::Arc;

pub struct NewsGatherer {
    http: Arc<HttpPool>,
    sources: Vec<Source>,
}

impl NewsGatherer {
    pub fn new(http: Arc<HttpPool>, sources: Vec<Source>) -> Self {
        Self { http, sources }
    }

    async fn fetch_feed(&self, source: &Source, window: CoverageWindow) -> Result<Vec<Item>, String> {
        let host = feed_host(&source.identifier);
        let response = self
            .http
            .execute(&host, HostPolicy::default(), || {
                self.http.client().get(&source.identifier)
            })
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("http status {}", response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        for entry in feed.entries {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                continue;
            };
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let published_at = entry
                .published
                .or(entry.updated)
                .unwrap_or_else(Utc::now);
            if !in_window(published_at, window) {
                continue;
            }

            let raw_body = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let (truncated, was_truncated) = truncate_payload(&raw_body);
            if was_truncated {
                tracing::debug!(source = %source.identifier, "truncated oversized item body");
            }
            let content = sanitize_to_plain_text(&truncated);

            let normalized = normalize_url(&link);
            let id = fingerprint_id(&normalized, &title);

            items.push(Item {
                id,
                category: Category::News,
                source_name: source.identifier.clone(),
                source_kind: SourceKind::Rss,
                url: link,
                title,
                content,
                author: entry.authors.first().map(|a| a.name.clone()),
                published_at,
                collected_at: Utc::now(),
                metadata: Default::default(),
                score: 0,
                per_item_summary: None,
                themes_tags: Vec::new(),
            });
        }
        Ok(items)
    }

    /// Fetch a single approved URL surfaced by the smart link extractor and
    /// emit it as a `News` item keyed by its own URL.
    async fn fetch_linked_article(&self, url: &str, window: CoverageWindow) -> Option<Item> {
        let host = feed_host(url);
        let response = self
            .http
            .execute(&host, HostPolicy::default(), || self.http.client().get(url))
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body = response.text().await.ok()?;
        let (truncated, _) = truncate_payload(&body);
        let content = sanitize_to_plain_text(&truncated);
        let title = extract_title(&truncated).unwrap_or_else(|| url.to_string());
        let normalized = normalize_url(url);
        let published_at = Utc::now();
        if !in_window(published_at, window) {
            return None;
        }
        Some(Item {
            id: fingerprint_id(&normalized, &title),
            category: Category::News,
            source_name: "smart-link".into(),
            source_kind: SourceKind::Rss,
            url: url.to_string(),
            title,
            content,
            author: None,
            published_at,
            collected_at: Utc::now(),
            metadata: Default::default(),
            score: 0,
            per_item_summary: None,
            themes_tags: Vec::new(),
        })
    }

    /// Append articles surfaced by the smart link extractor to an
    /// already-gathered news batch.
    pub async fn ingest_linked_articles(&self, urls: &[String], window: CoverageWindow) -> Vec<Item> {
        let mut out = Vec::new();
        for url in urls {
            if let Some(item) = self.fetch_linked_article(url, window).await {
                out.push(item);
            }
        }
        out
    }
}

pub(crate) fn feed_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn extract_title(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait::async_trait]
impl Gatherer for NewsGatherer {
    async fn gather(&self, window: CoverageWindow) -> (Vec<Item>, CategoryCollectionStatus) {
        let mut items = Vec::new();
        let mut per_source = Vec::new();

        for source in &self.sources {
            match self.fetch_feed(source, window).await {
                Ok(fetched) => {
                    per_source.push(SourceStatus {
                        source_name: source.identifier.clone(),
                        category: Category::News,
                        outcome: CollectionOutcome::Success,
                        item_count: fetched.len(),
                        message: None,
                    });
                    items.extend(fetched);
                }
                Err(message) => {
                    tracing::warn!(source = %source.identifier, error = %message, "news source fetch failed");
                    per_source.push(SourceStatus {
                        source_name: source.identifier.clone(),
                        category: Category::News,
                        outcome: CollectionOutcome::Failed,
                        item_count: 0,
                        message: Some(message),
                    });
                }
            }
        }

        let items = dedup_first_occurrence(items);
        let status = CategoryCollectionStatus {
            per_source,
            per_platform: Vec::new(),
            notice: None,
        };
        (items, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_title_reads_document_title_tag() {
        let html = "<html><head><title>  A Headline  </title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("A Headline"));
    }

    #[test]
    fn extract_title_is_none_when_missing() {
        let html = "<html><body>no title here</body></html>";
        assert_eq!(extract_title(html), None);
    }
}
