//! LLM pricing lookup for cost estimation.
//!
//! Provides per-token pricing for known models and computes estimated
//! costs. Prices are in USD per million tokens. Extended-thinking
//! (reasoning) tokens are billed at the model's output rate, since the
//! provider's wire contract reports them as additional output tokens.

/// Per-token pricing for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens (also used for reasoning tokens).
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Compute the estimated cost for the given token counts. Reasoning
    /// tokens are priced identically to output tokens.
    pub fn compute_cost(&self, input_tokens: u64, output_tokens: u64, reasoning_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_per_million;
        let output_cost =
            ((output_tokens + reasoning_tokens) as f64 / 1_000_000.0) * self.output_per_million;
        input_cost + output_cost
    }
}

/// Look up pricing for an Anthropic model.
pub fn lookup_anthropic(model: &str) -> ModelPricing {
    if model.contains("opus") {
        ModelPricing {
            input_per_million: 15.0,
            output_per_million: 75.0,
        }
    } else if model.contains("sonnet") {
        ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    } else if model.contains("haiku") {
        ModelPricing {
            input_per_million: 1.0,
            output_per_million: 5.0,
        }
    } else {
        // Unknown Anthropic model — use sonnet pricing.
        ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sonnet_pricing() {
        let p = lookup_anthropic("claude-sonnet-4-5-20250514");
        assert!((p.input_per_million - 3.0).abs() < f64::EPSILON);
        assert!((p.output_per_million - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn opus_pricing() {
        let p = lookup_anthropic("claude-opus-4-5");
        assert!((p.input_per_million - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_model_falls_back_to_sonnet_pricing() {
        let p = lookup_anthropic("claude-future-model");
        assert!((p.input_per_million - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn compute_cost_includes_reasoning_tokens_at_output_rate() {
        let p = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        let cost = p.compute_cost(1000, 500, 2000);
        let expected = (1000.0 / 1_000_000.0) * 3.0 + (2500.0 / 1_000_000.0) * 15.0;
        assert!((cost - expected).abs() < 1e-10);
    }
}
