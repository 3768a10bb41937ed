//! Sub-configuration structs with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sliding-window rate limit shared by all workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum outbound requests per window
    pub max_requests: usize,

    /// Window length in seconds
    pub window_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 15,
            window_secs: 60.0,
        }
    }
}

impl RateLimitConfig {
    /// Window length as a `Duration`. Negative or non-finite values map to zero,
    /// which the limiter rejects.
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_secs).unwrap_or(Duration::ZERO)
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on concurrent workers
    pub max_workers: usize,

    /// How long a worker waits for a rate-limit slot before giving up
    pub acquire_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            acquire_timeout_secs: 300,
        }
    }
}

/// Gemini service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// REST endpoint root
    pub endpoint: String,

    /// Attempts per model before falling back to the next one
    pub max_retries: u32,

    /// Backoff used when a throttled response carries no retry hint
    pub base_retry_delay_secs: u64,

    /// Added on top of the service's suggested retry delay
    pub retry_buffer_secs: u64,

    /// Per-request HTTP timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: "${GEMINI_API_KEY}".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 2,
            base_retry_delay_secs: 15,
            retry_buffer_secs: 2,
            request_timeout_ms: 120_000,
        }
    }
}

/// Answer document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Output format: "markdown", "text", "json" or "jsonl"
    pub format: String,

    /// Printed in the document header and used for the default filename
    pub student_name: String,

    /// Printed in the document header and used for the default filename
    pub group: String,

    /// Overrides the generated filename when non-empty
    pub output_filename: String,

    /// Directory the document is written to
    pub output_dir: String,

    /// Extra instructions appended to every request
    pub instructions: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
            student_name: String::new(),
            group: String::new(),
            output_filename: String::new(),
            output_dir: ".".to_string(),
            instructions: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
