//! Error types for the briefing pipeline core library.
//!
//! Each subsystem has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors; only
//! `OrchestratorError` can actually abort a run.

/// Errors from loading, resolving, and validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration failed validation; every violation found is listed.
    #[error("configuration invalid: {}", .violations.join("; "))]
    Invalid {
        /// Every validation violation found, collected rather than
        /// short-circuited on the first failure.
        violations: Vec<String>,
    },

    /// A `${NAME}` reference could not be resolved against the process environment.
    #[error("environment variable not set: {name}")]
    EnvVarUnresolved {
        /// The referenced variable name.
        name: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Writing a migrated configuration file or its backup failed.
    #[error("config migration failed: {source}")]
    MigrationFailed {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the shared HTTP dispatch pool / per-host rate limiter.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Network-level failure (DNS, connect, TLS, etc.).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote host returned HTTP 429.
    #[error("rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying, if the server provided one.
        retry_after_secs: Option<u64>,
    },

    /// All retry attempts were exhausted.
    #[error("request failed after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The request's configured deadline elapsed.
    #[error("request timed out")]
    Timeout,
}

/// Errors from interacting with the LLM provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,

    /// Underlying HTTP dispatch failed.
    #[error("LLM request failed: {0}")]
    Http(#[from] HttpError),

    /// LLM provider rate limit hit (transient, retried by the caller).
    #[error("LLM rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying, if provided by the API.
        retry_after_secs: Option<u64>,
    },

    /// LLM API returned a non-retryable error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// A reasoning budget was requested but the response contained no
    /// reasoning blocks.
    #[error("reasoning unavailable in {mode} mode: {remediation}")]
    ReasoningUnavailable {
        /// The auth mode in effect (`"direct"` or `"proxy"`).
        mode: String,
        /// A mode-specific remediation hint shown to the operator.
        remediation: String,
    },

    /// The model's output could not be parsed after the retry budget was spent.
    #[error("failed to parse LLM output after {attempts} attempt(s)")]
    OutputParseFailed {
        /// Number of parse attempts made.
        attempts: u8,
    },
}

/// Errors from interacting with the image generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// No image provider configured; the image phase is skipped, not failed.
    #[error("no image provider configured")]
    NotConfigured,

    /// Underlying HTTP dispatch failed.
    #[error("image request failed: {0}")]
    Http(#[from] HttpError),

    /// Image API returned a non-retryable error response.
    #[error("image API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// The response contained no usable image data.
    #[error("response contained no image data")]
    MissingImageData,

    /// Base64 decoding of the image payload failed.
    #[error("failed to decode image payload: {0}")]
    DecodeFailed(#[from] base64::DecodeError),
}

/// Local, source-scoped errors produced while gathering items. These never
/// escape a `Gatherer::gather` call; they are folded into `SourceStatus`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum GatherError {
    /// Fetching a source failed (network error, non-2xx response, timeout).
    #[error("failed to fetch {source}: {message}")]
    Fetch {
        /// The source identifier (URL, handle, or subreddit name).
        source: String,
        /// A human-readable description of the failure.
        message: String,
    },

    /// A source returned data that failed to parse into items.
    #[error("failed to parse items from {source}: {message}")]
    Parse {
        /// The source identifier.
        source: String,
        /// A human-readable description of the failure.
        message: String,
    },
}

/// Local, category-scoped errors produced while analyzing items. These
/// never escape `Analyzer::analyze`; they are folded into the category's
/// `CollectionOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The underlying LLM call failed.
    #[error("analysis call failed: {0}")]
    Llm(#[from] LlmError),

    /// The model's output could not be parsed after the allotted retries.
    #[error("failed to parse analysis output after {attempts} attempt(s)")]
    OutputParseFailed {
        /// Number of parse attempts made.
        attempts: u8,
    },
}

/// Errors from loading or enriching the ecosystem release timeline.
#[derive(Debug, thiserror::Error)]
pub enum EcosystemError {
    /// The curated release file could not be read.
    #[error("failed to read curated release file {path}: {source}")]
    ReadFailed {
        /// The path that was read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The curated release file contained invalid JSON.
    #[error("failed to parse curated release file {path}: {source}")]
    ParseFailed {
        /// The path that was parsed.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Appending newly detected releases to the curated file failed.
    #[error("failed to append to curated release file: {source}")]
    WriteFailed {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from executive summary synthesis and link enrichment.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    /// The underlying LLM call failed.
    #[error("summary call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Top-level error. Only this enum's variants can abort a run before the
/// orchestrator produces a `RunReport`; everything else degrades into a
/// `collection_status` entry.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The LLM client could not be constructed, or a reasoning-budget call
    /// violated the reasoning-present invariant.
    #[error("LLM client unavailable: {0}")]
    LlmUnavailable(#[from] LlmError),

    /// Writing the final artifacts failed.
    #[error("failed to write output artifacts: {0}")]
    Write(#[from] std::io::Error),
}
