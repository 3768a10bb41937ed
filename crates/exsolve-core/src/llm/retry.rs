//! Failure classification and backoff for the generation client.
//!
//! Classification prefers the structured parts of [`ApiError`] (HTTP status,
//! RPC status, retry info). Message heuristics are only consulted when the
//! failure carries no status code, since free text drifts between service
//! versions.

use crate::config::GeminiConfig;
use crate::error::ApiError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static RETRY_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"retry in ([\d.]+)\s*s").expect("retry hint pattern is valid")
});

/// How a failed call should be handled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureKind {
    /// Rate or quota signal; back off and retry the same model.
    Throttled { retry_after: Option<Duration> },
    /// The model is missing or cannot take this input; try the next model.
    Unavailable,
    /// The credential was rejected; nothing else will succeed either.
    Unauthorized,
    /// Anything else; try the next model.
    Other,
}

/// Retry budget and delays for one generation request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per model (including the first)
    pub max_retries: u32,
    /// Backoff when a throttled response carries no hint
    pub base_delay: Duration,
    /// Added on top of a service-suggested delay
    pub buffer: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(15),
            buffer: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay: Duration::from_secs(config.base_retry_delay_secs),
            buffer: Duration::from_secs(config.retry_buffer_secs),
        }
    }

    /// Delay before retrying a throttled call.
    pub fn delay_for(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint + self.buffer,
            None => self.base_delay,
        }
    }
}

/// Classify a failed call.
pub fn classify(error: &ApiError) -> FailureKind {
    let message = error.message.to_lowercase();

    if is_unauthorized(error, &message) {
        return FailureKind::Unauthorized;
    }

    let status = error.status.as_deref().unwrap_or_default();
    let retry_after = || error.retry_after.or_else(|| parse_retry_hint(&message));

    if let Some(code) = error.status_code {
        return match (code, status) {
            (429, _) | (_, "RESOURCE_EXHAUSTED") => FailureKind::Throttled {
                retry_after: retry_after(),
            },
            (404, _) | (_, "NOT_FOUND") => FailureKind::Unavailable,
            // Access to this model is refused; the key itself may still be good
            (403, _) | (_, "PERMISSION_DENIED") => FailureKind::Unavailable,
            (400, _) if message.contains("not supported") => FailureKind::Unavailable,
            _ => FailureKind::Other,
        };
    }

    // No status code (transport errors, SDK-style messages): fall back to text
    if message.contains("429")
        || message.contains("quota")
        || message.contains("rate limit")
        || message.contains("exceeded")
    {
        return FailureKind::Throttled {
            retry_after: retry_after(),
        };
    }
    if message.contains("404") || message.contains("not found") || message.contains("not supported")
    {
        return FailureKind::Unavailable;
    }
    FailureKind::Other
}

fn is_unauthorized(error: &ApiError, message: &str) -> bool {
    error.status_code == Some(401)
        || error.status.as_deref() == Some("UNAUTHENTICATED")
        || error.message.contains("API_KEY_INVALID")
        || message.contains("api key")
        || message.contains("api_key")
}

/// Whether the service refused access outright (403 / `PERMISSION_DENIED`).
///
/// Per-model during generation, but fatal when listing models: without
/// access to the model list nothing can run.
pub fn is_access_denied(error: &ApiError) -> bool {
    error.status_code == Some(403) || error.status.as_deref() == Some("PERMISSION_DENIED")
}

/// Extract a "retry in 12.5s" hint from an error message.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    RETRY_HINT
        .captures(&message.to_lowercase())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Parse a protobuf duration literal such as `"37s"` or `"1.5s"`.
pub fn parse_duration_literal(value: &str) -> Option<Duration> {
    value
        .trim()
        .strip_suffix('s')
        .and_then(|secs| secs.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_429_is_throttled() {
        let err = ApiError::http(429, "Resource has been exhausted");
        assert_eq!(
            classify(&err),
            FailureKind::Throttled { retry_after: None }
        );
    }

    #[test]
    fn test_structured_retry_after_wins() {
        let err = ApiError::http(429, "quota exceeded, retry in 9s")
            .with_status("RESOURCE_EXHAUSTED")
            .with_retry_after(Duration::from_secs(37));
        assert_eq!(
            classify(&err),
            FailureKind::Throttled {
                retry_after: Some(Duration::from_secs(37))
            }
        );
    }

    #[test]
    fn test_retry_hint_from_message() {
        let err = ApiError::message("429 You exceeded your current quota. Please retry in 12.5s.");
        assert_eq!(
            classify(&err),
            FailureKind::Throttled {
                retry_after: Some(Duration::from_millis(12_500))
            }
        );
    }

    #[test]
    fn test_not_found_is_unavailable() {
        let err = ApiError::http(404, "models/gemini-1.5-pro is not found").with_status("NOT_FOUND");
        assert_eq!(classify(&err), FailureKind::Unavailable);

        let err = ApiError::http(400, "Image input is not supported for this model");
        assert_eq!(classify(&err), FailureKind::Unavailable);

        let err = ApiError::message("404 model not found");
        assert_eq!(classify(&err), FailureKind::Unavailable);
    }

    #[test]
    fn test_auth_failures() {
        let err = ApiError::http(400, "API key not valid. Please pass a valid API key.")
            .with_status("INVALID_ARGUMENT");
        assert_eq!(classify(&err), FailureKind::Unauthorized);

        let err = ApiError::http(400, "reason: API_KEY_INVALID");
        assert_eq!(classify(&err), FailureKind::Unauthorized);

        let err = ApiError::http(401, "unauthenticated").with_status("UNAUTHENTICATED");
        assert_eq!(classify(&err), FailureKind::Unauthorized);
    }

    #[test]
    fn test_permission_denied_is_per_model() {
        let err = ApiError::http(403, "denied").with_status("PERMISSION_DENIED");
        assert_eq!(classify(&err), FailureKind::Unavailable);
        assert!(is_access_denied(&err));

        // A 403 that blames the key is still a credential failure
        let err = ApiError::http(403, "API key not valid").with_status("PERMISSION_DENIED");
        assert_eq!(classify(&err), FailureKind::Unauthorized);

        assert!(!is_access_denied(&ApiError::http(404, "missing")));
    }

    #[test]
    fn test_status_code_suppresses_text_heuristics() {
        // A body that happens to mention a quota is not a throttle when the
        // status says otherwise.
        let err = ApiError::http(500, "internal error while checking quota");
        assert_eq!(classify(&err), FailureKind::Other);
    }

    #[test]
    fn test_connection_error_is_other() {
        let err = ApiError::message("Gemini request failed: connection refused");
        assert_eq!(classify(&err), FailureKind::Other);
    }

    #[test]
    fn test_policy_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(None), Duration::from_secs(15));
        assert_eq!(
            policy.delay_for(Some(Duration::from_secs(10))),
            Duration::from_secs(12)
        );
    }

    #[test]
    fn test_policy_from_config_keeps_one_attempt() {
        let config = GeminiConfig {
            max_retries: 0,
            ..GeminiConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_retries, 1);
    }

    #[test]
    fn test_parse_duration_literal() {
        assert_eq!(parse_duration_literal("37s"), Some(Duration::from_secs(37)));
        assert_eq!(
            parse_duration_literal("1.5s"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_duration_literal("soon"), None);
    }
}
