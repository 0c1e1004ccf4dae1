//! Typed configuration sections.

use serde::{Deserialize, Serialize};

/// A configuration value that is either a literal or a `${NAME}` reference
/// resolved from the process environment at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(pub String);

impl SecretRef {
    /// The referenced environment variable name, if this value is a `${NAME}` reference.
    pub fn env_var_name(&self) -> Option<&str> {
        self.0
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
    }

    /// Resolve this value against an environment source, substituting
    /// `${NAME}` references. Literal values pass through unchanged.
    pub fn resolve(&self, env: &impl super::env::EnvSource) -> Result<String, crate::error::ConfigError> {
        match self.env_var_name() {
            Some(name) => env.get(name).ok_or_else(|| crate::error::ConfigError::EnvVarUnresolved {
                name: name.to_string(),
            }),
            None => Ok(self.0.clone()),
        }
    }
}

/// Authentication/transport mode for the LLM client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmMode {
    /// Native API-key header auth against the canonical endpoint.
    Direct,
    /// Bearer-token auth against a user-supplied endpoint.
    Proxy,
}

/// Authentication/transport mode for the image client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Typed models-API-shaped request, no endpoint required.
    Native,
    /// Chat-completions-shaped request; endpoint required.
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub mode: LlmMode,
    pub api_key: SecretRef,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProviderConfig {
    pub mode: ImageMode,
    pub api_key: SecretRef,
    /// Required when `mode == Proxy`; unused (and optional) in `native` mode.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Concurrency/resource knobs from §5 of the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_per_category_concurrency")]
    pub per_category_concurrency: usize,
    #[serde(default = "default_http_pool_size")]
    pub http_pool_size: usize,
    #[serde(default = "default_run_deadline_secs")]
    pub run_deadline_secs: u64,
    #[serde(default = "default_map_batch_size")]
    pub map_batch_size: usize,
    #[serde(default = "default_max_http_attempts")]
    pub max_http_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            per_category_concurrency: default_per_category_concurrency(),
            http_pool_size: default_http_pool_size(),
            run_deadline_secs: default_run_deadline_secs(),
            map_batch_size: default_map_batch_size(),
            max_http_attempts: default_max_http_attempts(),
        }
    }
}

/// Paths to the line-delimited source lists described in §6.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    pub rss_feeds: String,
    pub preprint_categories: String,
    pub research_feeds: String,
    pub microblog_accounts: String,
    pub federated_microblog_accounts: String,
    pub federated_longform_accounts: String,
    pub forum_names: String,
}

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub llm: LlmProviderConfig,
    #[serde(default)]
    pub image: Option<ImageProviderConfig>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-sonnet-4-5-20250514".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_per_category_concurrency() -> usize {
    4
}

fn default_http_pool_size() -> usize {
    32
}

fn default_run_deadline_secs() -> u64 {
    1200
}

fn default_map_batch_size() -> usize {
    75
}

fn default_max_http_attempts() -> u32 {
    3
}
