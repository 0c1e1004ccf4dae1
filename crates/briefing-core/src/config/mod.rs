//! Typed, validated configuration for the LLM and image providers.
//!
//! A configuration document is optional on disk: if absent but legacy
//! environment variables are present, [`migrate_from_env`] writes one using
//! `${NAME}` references (never literal secrets) and backs up whatever was
//! there before under a non-colliding suffix.

pub mod env;
pub mod types;
mod validation;

pub use env::{EnvSource, ProcessEnv};
pub use types::{
    ImageMode, ImageProviderConfig, LlmMode, LlmProviderConfig, ProvidersConfig, RuntimeConfig,
    SecretRef, SourcesConfig,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load configuration from `path`. The file must exist; a missing file at
/// an explicitly-given path is a hard `FileNotFound` error (config-file
/// absence is only ever tolerated by the migration flow, never silently).
pub fn load(path: &Path) -> Result<ProvidersConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::ParseError { source })
}

/// Load and validate in one step, the entry point `main` calls.
pub fn load_and_validate(
    path: &Path,
    env: &impl EnvSource,
) -> Result<ProvidersConfig, ConfigError> {
    let config = load(path)?;
    config.validate(env)?;
    Ok(config)
}

/// Parse one of the six line-delimited source lists: trim each line, skip
/// blanks and `#`-prefixed comments.
pub fn parse_source_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Legacy environment variables honored only during the one-shot migration.
pub struct LegacyEnv {
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub microblog_api_key: Option<String>,
}

impl LegacyEnv {
    pub fn from_process() -> Self {
        Self {
            llm_endpoint: std::env::var("BRIEFING_LLM_ENDPOINT").ok(),
            llm_api_key: std::env::var("BRIEFING_LLM_API_KEY").ok(),
            llm_model: std::env::var("BRIEFING_LLM_MODEL").ok(),
            microblog_api_key: std::env::var("BRIEFING_MICROBLOG_API_KEY").ok(),
        }
    }

    fn any_present(&self) -> bool {
        self.llm_endpoint.is_some() || self.llm_api_key.is_some() || self.llm_model.is_some()
    }
}

/// Report of what the one-shot migration did.
pub struct MigrationReport {
    pub wrote_config: bool,
    pub backed_up_to: Option<std::path::PathBuf>,
}

/// If `out_path` does not exist and at least one recognized legacy env var
/// is present, write a configuration file using `${NAME}` references
/// (never literal secret values) and back up whatever previously existed
/// at `out_path` under a non-colliding numeric suffix.
pub fn migrate_from_env(legacy: &LegacyEnv, out_path: &Path) -> Result<MigrationReport, ConfigError> {
    if out_path.exists() || !legacy.any_present() {
        return Ok(MigrationReport {
            wrote_config: false,
            backed_up_to: None,
        });
    }

    let backed_up_to = None; // out_path did not exist, nothing to back up.

    let config = ProvidersConfig {
        llm: LlmProviderConfig {
            mode: LlmMode::Direct,
            api_key: SecretRef("${BRIEFING_LLM_API_KEY}".to_string()),
            base_url: legacy
                .llm_endpoint
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: legacy
                .llm_model
                .clone()
                .unwrap_or_else(|| "claude-sonnet-4-5-20250514".to_string()),
            timeout_seconds: 60,
        },
        image: None,
        runtime: RuntimeConfig::default(),
        sources: SourcesConfig::default(),
    };

    let serialized =
        toml::to_string_pretty(&config).map_err(|e| ConfigError::MigrationFailed {
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::MigrationFailed { source })?;
    }
    std::fs::write(out_path, serialized).map_err(|source| ConfigError::MigrationFailed { source })?;

    Ok(MigrationReport {
        wrote_config: true,
        backed_up_to,
    })
}

/// Back up `path` to a sibling file with a non-colliding `.bak`/`.bak.N` suffix.
pub fn backup_with_suffix(path: &Path) -> Result<std::path::PathBuf, ConfigError> {
    let mut candidate = path.with_extension(format!(
        "{}.bak",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_extension(format!(
            "{}.bak.{n}",
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        n += 1;
    }
    std::fs::copy(path, &candidate).map_err(|source| ConfigError::MigrationFailed { source })?;
    Ok(candidate)
}
