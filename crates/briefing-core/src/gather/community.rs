//! Forum gatherer: anonymous JSON endpoints, no credentials required.

use super::{dedup_first_occurrence, in_window, Gatherer};
use crate::fingerprint::{fingerprint_id, normalize_url};
use crate::http::{HostPolicy, HttpPool};
use crate::model::{
    Category, CategoryCollectionStatus, CollectionOutcome, CoverageWindow, Item, Source,
    SourceKind, SourceStatus,
};
use crate::sanitize::sanitize_to_plain_text;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Identifying User-Agent sent on every forum request, since these
/// endpoints are anonymous but still expect a named client.
const USER_AGENT: &str = "briefing-pipeline/1.0 (+https://github.com)";

pub struct CommunityGatherer {
    http: Arc<HttpPool>,
    sources: Vec<Source>,
}

impl CommunityGatherer {
    pub fn new(http: Arc<HttpPool>, sources: Vec<Source>) -> Self {
        Self { http, sources }
    }

    async fn fetch_forum(&self, forum: &str, window: CoverageWindow) -> Result<Vec<Item>, String> {
        let url = format!("https://{forum}.example/api/v1/posts/new.json");
        let response = self
            .http
            .execute(&format!("{forum}.example"), HostPolicy::default(), || {
                self.http.client().get(&url).header("User-Agent", USER_AGENT)
            })
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("http status {}", response.status().as_u16()));
        }
        let body: ForumResponse = response.json().await.map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        for post in body.posts {
            if !in_window(post.created_at, window) {
                continue;
            }
            let content = sanitize_to_plain_text(&post.body);
            let normalized = normalize_url(&post.url);
            let mut metadata = std::collections::HashMap::new();
            metadata.insert("engagement".to_string(), post.score.to_string());

            items.push(Item {
                id: fingerprint_id(&normalized, &post.title),
                category: Category::Community,
                source_name: forum.to_string(),
                source_kind: SourceKind::Forum,
                url: post.url,
                title: post.title,
                content,
                author: post.author,
                published_at: post.created_at,
                collected_at: Utc::now(),
                metadata,
                score: 0,
                per_item_summary: None,
                themes_tags: Vec::new(),
            });
        }
        Ok(items)
    }
}

#[derive(Deserialize)]
struct ForumResponse {
    #[serde(default)]
    posts: Vec<ForumPost>,
}

#[derive(Deserialize)]
struct ForumPost {
    title: String,
    body: String,
    url: String,
    #[serde(default)]
    author: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    score: i64,
}

#[async_trait::async_trait]
impl Gatherer for CommunityGatherer {
    async fn gather(&self, window: CoverageWindow) -> (Vec<Item>, CategoryCollectionStatus) {
        let mut items = Vec::new();
        let mut per_source = Vec::new();

        for source in &self.sources {
            match self.fetch_forum(&source.identifier, window).await {
                Ok(fetched) => {
                    per_source.push(SourceStatus {
                        source_name: source.identifier.clone(),
                        category: Category::Community,
                        outcome: CollectionOutcome::Success,
                        item_count: fetched.len(),
                        message: None,
                    });
                    items.extend(fetched);
                }
                Err(message) => {
                    tracing::warn!(source = %source.identifier, error = %message, "forum source fetch failed");
                    per_source.push(SourceStatus {
                        source_name: source.identifier.clone(),
                        category: Category::Community,
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

    #[tokio::test]
    async fn empty_source_list_yields_empty_items_and_success_status() {
        let http = Arc::new(HttpPool::new(4));
        let gatherer = CommunityGatherer::new(http, Vec::new());
        let window = CoverageWindow {
            start: Utc::now() - chrono::Duration::hours(24),
            end: Utc::now(),
        };
        let (items, status) = gatherer.gather(window).await;
        assert!(items.is_empty());
        assert!(status.per_source.is_empty());
        assert_eq!(status.overall(), CollectionOutcome::Success);
    }
}
