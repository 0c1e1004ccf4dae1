//! Dual-mode Anthropic Messages API transport.
//!
//! `DirectAnthropicClient` authenticates with a native `x-api-key` header
//! against the canonical base URL; `ProxyAnthropicClient` authenticates
//! with a bearer token against a user-supplied base URL and never appends
//! `/v1` itself (a base URL missing it is caught at config-validation time,
//! not patched here).

use super::{LlmClient, LlmResponse, LlmUsage, ReasoningBudget};
use crate::cost::CostAccumulator;
use crate::error::LlmError;
use crate::http::{HostPolicy, HttpPool};
use crate::llm::pricing;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Native API-key auth against the canonical Anthropic endpoint.
pub struct DirectAnthropicClient {
    http: Arc<HttpPool>,
    cost: Arc<CostAccumulator>,
    base_url: String,
    api_key: String,
    model: String,
}

impl DirectAnthropicClient {
    pub fn new(http: Arc<HttpPool>, cost: Arc<CostAccumulator>, api_key: String, model: String) -> Self {
        Self {
            http,
            cost,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key,
            model,
        }
    }

    /// Construct with a custom base URL, for testing against a mock server.
    pub fn with_base_url(
        http: Arc<HttpPool>,
        cost: Arc<CostAccumulator>,
        api_key: String,
        model: String,
        base_url: String,
    ) -> Self {
        Self {
            http,
            cost,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for DirectAnthropicClient {
    async fn call_with_reasoning(
        &self,
        system: &str,
        user: &str,
        budget: ReasoningBudget,
        phase: &str,
    ) -> Result<LlmResponse, LlmError> {
        call_messages_api(
            &self.http,
            &self.cost,
            &self.base_url,
            &self.model,
            AuthHeader::ApiKey(&self.api_key),
            "direct",
            system,
            user,
            budget,
            phase,
        )
        .await
    }
}

/// Bearer-token auth against a user-supplied proxy endpoint.
pub struct ProxyAnthropicClient {
    http: Arc<HttpPool>,
    cost: Arc<CostAccumulator>,
    base_url: String,
    api_key: String,
    model: String,
}

impl ProxyAnthropicClient {
    pub fn new(
        http: Arc<HttpPool>,
        cost: Arc<CostAccumulator>,
        api_key: String,
        model: String,
        base_url: String,
    ) -> Self {
        Self {
            http,
            cost,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ProxyAnthropicClient {
    async fn call_with_reasoning(
        &self,
        system: &str,
        user: &str,
        budget: ReasoningBudget,
        phase: &str,
    ) -> Result<LlmResponse, LlmError> {
        call_messages_api(
            &self.http,
            &self.cost,
            &self.base_url,
            &self.model,
            AuthHeader::Bearer(&self.api_key),
            "proxy",
            system,
            user,
            budget,
            phase,
        )
        .await
    }
}

enum AuthHeader<'a> {
    ApiKey(&'a str),
    Bearer(&'a str),
}

#[allow(clippy::too_many_arguments)]
async fn call_messages_api(
    http: &HttpPool,
    cost: &CostAccumulator,
    base_url: &str,
    model: &str,
    auth: AuthHeader<'_>,
    mode: &str,
    system: &str,
    user: &str,
    budget: ReasoningBudget,
    phase: &str,
) -> Result<LlmResponse, LlmError> {
    let budget_tokens = budget.tokens();
    let temperature = if budget_tokens > 0 { 1.0 } else { 0.7 };

    let request = AnthropicRequest {
        model,
        max_tokens: budget_tokens.max(1024) + 1024,
        system: if system.is_empty() { None } else { Some(system) },
        messages: vec![AnthropicMessage {
            role: "user",
            content: user,
        }],
        temperature,
        thinking: if budget_tokens > 0 {
            Some(ThinkingConfig {
                thinking_type: "enabled",
                budget_tokens,
            })
        } else {
            None
        },
    };

    let url = format!("{base_url}/v1/messages");
    let host = reqwest::Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| base_url.to_string());

    tracing::debug!(mode, model, phase, budget_tokens, "LLM request");

    let response = http
        .execute(&host, HostPolicy::default(), || {
            let builder = http.client().post(&url).json(&request);
            match &auth {
                AuthHeader::ApiKey(key) => builder
                    .header("x-api-key", *key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
                AuthHeader::Bearer(key) => builder.bearer_auth(key),
            }
        })
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(LlmError::Api { status, message });
    }

    let body: AnthropicResponse = response
        .json()
        .await
        .map_err(|e| LlmError::OutputParseFailed { attempts: 1 }.tap_log(e))?;

    let mut text_parts = Vec::new();
    let mut reasoning_blocks = Vec::new();
    for block in body.content {
        match block.block_type.as_str() {
            "text" => text_parts.push(block.text),
            "thinking" => reasoning_blocks.push(block.thinking),
            _ => {}
        }
    }
    let text = text_parts.join("");

    // The API does not report a separate reasoning-token count; approximate
    // it from the thinking text so the cost accumulator has something to
    // bill against (reasoning tokens are priced at the output rate).
    let usage = body.usage.map_or_else(LlmUsage::default, |u| LlmUsage {
        input_tokens: u64::from(u.input_tokens.unwrap_or(0)),
        output_tokens: u64::from(u.output_tokens.unwrap_or(0)),
        reasoning_tokens: reasoning_blocks
            .iter()
            .map(|b| (b.len() / 4) as u64)
            .sum(),
    });

    if budget_tokens > 0 && reasoning_blocks.is_empty() {
        return Err(LlmError::ReasoningUnavailable {
            mode: mode.to_string(),
            remediation: remediation_for(mode),
        });
    }

    let pricing = pricing::lookup_anthropic(model);
    let call_cost = pricing.compute_cost(usage.input_tokens, usage.output_tokens, usage.reasoning_tokens);
    cost.record(
        phase,
        usage.input_tokens,
        usage.output_tokens,
        usage.reasoning_tokens,
        call_cost,
    )
    .await;

    tracing::debug!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        reasoning_tokens = usage.reasoning_tokens,
        "LLM response",
    );

    Ok(LlmResponse {
        text,
        reasoning_blocks,
        usage,
    })
}

fn remediation_for(mode: &str) -> String {
    if mode == "proxy" {
        "reasoning not found in response; if running through a proxy, verify it passes through the thinking block unmodified".to_string()
    } else {
        "reasoning not found in response; verify the configured model supports extended thinking".to_string()
    }
}

trait TapLog {
    fn tap_log(self, err: reqwest::Error) -> Self;
}

impl TapLog for LlmError {
    fn tap_log(self, err: reqwest::Error) -> Self {
        tracing::warn!(error = %err, "failed to parse Anthropic response body");
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    thinking_type: &'static str,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    thinking: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(default)]
    message: String,
}
