//! Total validation: every violation is collected, none short-circuits.

use super::env::EnvSource;
use super::types::{ImageMode, ProvidersConfig};

impl ProvidersConfig {
    /// Validate the whole document, collecting every violation rather than
    /// stopping at the first one found.
    pub fn validate(&self, env: &impl EnvSource) -> Result<(), crate::error::ConfigError> {
        let mut violations = Vec::new();

        if self.llm.api_key.0.trim().is_empty() {
            violations.push("llm.api_key is missing".to_string());
        } else if let Err(e) = self.llm.api_key.resolve(env) {
            violations.push(e.to_string());
        }

        if self.llm.base_url.ends_with("/v1") {
            violations.push(
                "llm.base_url must not include a trailing /v1 segment; it is appended internally"
                    .to_string(),
            );
        }

        if self.llm.model.trim().is_empty() {
            violations.push("llm.model is missing".to_string());
        }

        if let Some(image) = &self.image {
            if image.api_key.0.trim().is_empty() {
                violations.push("image.api_key is missing".to_string());
            } else if let Err(e) = image.api_key.resolve(env) {
                violations.push(e.to_string());
            }

            if image.mode == ImageMode::Proxy && image.endpoint.as_deref().unwrap_or("").is_empty()
            {
                violations.push("image.endpoint is required when image.mode is proxy".to_string());
            }
        }

        if self.runtime.per_category_concurrency == 0 {
            violations.push("runtime.per_category_concurrency must be greater than 0".to_string());
        }
        if self.runtime.http_pool_size == 0 {
            violations.push("runtime.http_pool_size must be greater than 0".to_string());
        }
        if self.runtime.map_batch_size == 0 {
            violations.push("runtime.map_batch_size must be greater than 0".to_string());
        }
        if self.runtime.run_deadline_secs == 0 {
            violations.push("runtime.run_deadline_secs must be greater than 0".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(crate::error::ConfigError::Invalid { violations })
        }
    }
}
