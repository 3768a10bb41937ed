//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::output::DocumentFormat;

use super::Config;

/// Longest accepted rate-limit window (one day).
const MAX_WINDOW_SECS: f64 = 86_400.0;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_requests must be > 0".into(),
            ));
        }
        if !(self.rate_limit.window_secs.is_finite() && self.rate_limit.window_secs > 0.0) {
            return Err(ConfigError::ValidationError(
                "rate_limit.window_secs must be > 0".into(),
            ));
        }
        if self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::ValidationError(format!(
                "rate_limit.window_secs must be <= {MAX_WINDOW_SECS}"
            )));
        }
        if self.pipeline.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_workers must be > 0".into(),
            ));
        }
        if self.pipeline.acquire_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.acquire_timeout_secs must be > 0".into(),
            ));
        }
        if self.gemini.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "gemini.max_retries must be > 0".into(),
            ));
        }
        if self.gemini.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gemini.request_timeout_ms must be > 0".into(),
            ));
        }
        if DocumentFormat::parse(&self.document.format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "document.format must be one of markdown, text, json, jsonl (got '{}')",
                self.document.format
            )));
        }
        Ok(())
    }
}
