//! Microblog / federated-microblog / federated-longform gatherer.
//!
//! The microblog platform requires a bearer token (mirrors the teacher's
//! `XApiHttpClient` bearer-auth style against `api.x.com/2`); the two
//! federated platforms expose anonymous public JSON endpoints and never
//! require credentials.

use super::{dedup_first_occurrence, in_window, Gatherer};
use crate::fingerprint::{fingerprint_id, normalize_url};
use crate::http::{HostPolicy, HttpPool};
use crate::model::{
    Category, CategoryCollectionStatus, CollectionOutcome, CoverageWindow, Item, PlatformStatus,
    Source, SourceKind,
};
use crate::sanitize::sanitize_to_plain_text;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

const MICROBLOG_BASE_URL: &str = "https://api.x.com/2";

pub struct SocialGatherer {
    http: Arc<HttpPool>,
    microblog_accounts: Vec<Source>,
    federated_microblog_accounts: Vec<Source>,
    federated_longform_accounts: Vec<Source>,
    microblog_bearer_token: Option<String>,
}

impl SocialGatherer {
    pub fn new(
        http: Arc<HttpPool>,
        microblog_accounts: Vec<Source>,
        federated_microblog_accounts: Vec<Source>,
        federated_longform_accounts: Vec<Source>,
        microblog_bearer_token: Option<String>,
    ) -> Self {
        Self {
            http,
            microblog_accounts,
            federated_microblog_accounts,
            federated_longform_accounts,
            microblog_bearer_token,
        }
    }

    async fn fetch_microblog_account(&self, handle: &str, token: &str, window: CoverageWindow) -> Result<Vec<Item>, String> {
        let url = format!(
            "{MICROBLOG_BASE_URL}/users/by/username/{handle}/tweets?tweet.fields=public_metrics,created_at&max_results=25"
        );
        let response = self
            .http
            .execute("api.x.com", HostPolicy::default(), || {
                self.http.client().get(&url).bearer_auth(token)
            })
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("http status {}", response.status().as_u16()));
        }
        let body: MicroblogResponse = response.json().await.map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        for post in body.data.unwrap_or_default() {
            let Some(published_at) = post.created_at else { continue };
            if !in_window(published_at, window) {
                continue;
            }
            let url = format!("https://x.com/{handle}/status/{}", post.id);
            let normalized = normalize_url(&url);
            let engagement = post
                .public_metrics
                .as_ref()
                .map(|m| m.like_count + m.retweet_count)
                .unwrap_or(0);
            let mut metadata = std::collections::HashMap::new();
            metadata.insert("engagement".to_string(), engagement.to_string());
            let content = sanitize_to_plain_text(&post.text);

            items.push(Item {
                id: fingerprint_id(&normalized, &post.text),
                category: Category::Social,
                source_name: handle.to_string(),
                source_kind: SourceKind::Api,
                url,
                title: post.text.chars().take(80).collect(),
                content,
                author: Some(handle.to_string()),
                published_at,
                collected_at: Utc::now(),
                metadata,
                score: 0,
                per_item_summary: None,
                themes_tags: Vec::new(),
            });
        }
        Ok(items)
    }

    async fn fetch_federated_microblog_account(&self, source: &Source, window: CoverageWindow) -> Result<Vec<Item>, String> {
        let (instance, handle) = split_federated_handle(&source.identifier)?;
        let url = format!("https://{instance}/api/v1/accounts/lookup?acct={handle}");
        let lookup = self
            .http
            .execute(&instance, HostPolicy::default(), || self.http.client().get(&url))
            .await
            .map_err(|e| e.to_string())?;
        if !lookup.status().is_success() {
            return Err(format!("http status {}", lookup.status().as_u16()));
        }
        let account: FederatedAccount = lookup.json().await.map_err(|e| e.to_string())?;

        let statuses_url = format!("https://{instance}/api/v1/accounts/{}/statuses?limit=25", account.id);
        let response = self
            .http
            .execute(&instance, HostPolicy::default(), || self.http.client().get(&statuses_url))
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("http status {}", response.status().as_u16()));
        }
        let statuses: Vec<FederatedStatus> = response.json().await.map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        for status in statuses {
            if !in_window(status.created_at, window) {
                continue;
            }
            let content = sanitize_to_plain_text(&status.content);
            let normalized = normalize_url(&status.url);
            let mut metadata = std::collections::HashMap::new();
            metadata.insert(
                "engagement".to_string(),
                (status.favourites_count + status.reblogs_count).to_string(),
            );

            items.push(Item {
                id: fingerprint_id(&normalized, &content),
                category: Category::Social,
                source_name: source.identifier.clone(),
                source_kind: SourceKind::Api,
                url: status.url,
                title: content.chars().take(80).collect(),
                content,
                author: Some(handle.clone()),
                published_at: status.created_at,
                collected_at: Utc::now(),
                metadata,
                score: 0,
                per_item_summary: None,
                themes_tags: Vec::new(),
            });
        }
        Ok(items)
    }

    async fn fetch_federated_longform_account(&self, source: &Source, window: CoverageWindow) -> Result<Vec<Item>, String> {
        let (instance, handle) = split_federated_handle(&source.identifier)?;
        let url = format!("https://{instance}/api/collections/{handle}/posts");
        let response = self
            .http
            .execute(&instance, HostPolicy::default(), || self.http.client().get(&url))
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("http status {}", response.status().as_u16()));
        }
        let body: LongformResponse = response.json().await.map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        for post in body.data.posts {
            if !in_window(post.created, window) {
                continue;
            }
            let (truncated, _) = crate::sanitize::truncate_payload(&post.body);
            let content = sanitize_to_plain_text(&truncated);
            let normalized = normalize_url(&post.url);

            items.push(Item {
                id: fingerprint_id(&normalized, &post.title),
                category: Category::Social,
                source_name: source.identifier.clone(),
                source_kind: SourceKind::Api,
                url: post.url,
                title: post.title,
                content,
                author: Some(handle.clone()),
                published_at: post.created,
                collected_at: Utc::now(),
                metadata: Default::default(),
                score: 0,
                per_item_summary: None,
                themes_tags: Vec::new(),
            });
        }
        Ok(items)
    }
}

/// Federated identifiers are written `instance.example/@handle`.
fn split_federated_handle(identifier: &str) -> Result<(String, String), String> {
    let (instance, handle) = identifier
        .split_once('/')
        .ok_or_else(|| format!("malformed federated identifier: {identifier}"))?;
    Ok((instance.to_string(), handle.trim_start_matches('@').to_string()))
}

#[derive(Deserialize)]
struct MicroblogResponse {
    #[serde(default)]
    data: Option<Vec<MicroblogPost>>,
}

#[derive(Deserialize)]
struct MicroblogPost {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: Option<MicroblogMetrics>,
}

#[derive(Deserialize)]
struct MicroblogMetrics {
    like_count: u64,
    retweet_count: u64,
}

#[derive(Deserialize)]
struct FederatedAccount {
    id: String,
}

#[derive(Deserialize)]
struct FederatedStatus {
    url: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    favourites_count: u64,
    #[serde(default)]
    reblogs_count: u64,
}

#[derive(Deserialize)]
struct LongformResponse {
    data: LongformData,
}

#[derive(Deserialize)]
struct LongformData {
    posts: Vec<LongformPost>,
}

#[derive(Deserialize)]
struct LongformPost {
    title: String,
    body: String,
    url: String,
    created: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Gatherer for SocialGatherer {
    async fn gather(&self, window: CoverageWindow) -> (Vec<Item>, CategoryCollectionStatus) {
        let mut items = Vec::new();
        let mut per_platform = Vec::new();

        match &self.microblog_bearer_token {
            None => {
                per_platform.push(PlatformStatus {
                    platform: "microblog".to_string(),
                    outcome: CollectionOutcome::Skipped,
                    item_count: 0,
                    message: Some("no credentials configured".to_string()),
                });
            }
            Some(token) => {
                let mut count = 0;
                let mut any_failed = false;
                for source in &self.microblog_accounts {
                    match self.fetch_microblog_account(&source.identifier, token, window).await {
                        Ok(fetched) => {
                            count += fetched.len();
                            items.extend(fetched);
                        }
                        Err(message) => {
                            tracing::warn!(account = %source.identifier, error = %message, "microblog account fetch failed");
                            any_failed = true;
                        }
                    }
                }
                per_platform.push(PlatformStatus {
                    platform: "microblog".to_string(),
                    outcome: if any_failed { CollectionOutcome::Partial } else { CollectionOutcome::Success },
                    item_count: count,
                    message: None,
                });
            }
        }

        let mut count = 0;
        let mut any_failed = false;
        for source in &self.federated_microblog_accounts {
            match self.fetch_federated_microblog_account(source, window).await {
                Ok(fetched) => {
                    count += fetched.len();
                    items.extend(fetched);
                }
                Err(message) => {
                    tracing::warn!(account = %source.identifier, error = %message, "federated microblog account fetch failed");
                    any_failed = true;
                }
            }
        }
        per_platform.push(PlatformStatus {
            platform: "federated-microblog".to_string(),
            outcome: if any_failed { CollectionOutcome::Partial } else { CollectionOutcome::Success },
            item_count: count,
            message: None,
        });

        let mut count = 0;
        let mut any_failed = false;
        for source in &self.federated_longform_accounts {
            match self.fetch_federated_longform_account(source, window).await {
                Ok(fetched) => {
                    count += fetched.len();
                    items.extend(fetched);
                }
                Err(message) => {
                    tracing::warn!(account = %source.identifier, error = %message, "federated longform account fetch failed");
                    any_failed = true;
                }
            }
        }
        per_platform.push(PlatformStatus {
            platform: "federated-longform".to_string(),
            outcome: if any_failed { CollectionOutcome::Partial } else { CollectionOutcome::Success },
            item_count: count,
            message: None,
        });

        let items = dedup_first_occurrence(items);
        let status = CategoryCollectionStatus {
            per_source: Vec::new(),
            per_platform,
            notice: None,
        };
        (items, status)
    }
}
