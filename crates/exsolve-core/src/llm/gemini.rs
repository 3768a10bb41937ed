//! Gemini vision service over the Generative Language REST API.
//!
//! Sends the prompt and an inline base64 image part to
//! `{endpoint}/{model}:generateContent`. Error bodies are parsed into
//! structured [`ApiError`]s (HTTP code, RPC status, retry info) so the retry
//! policy can classify them without matching on text.

use super::provider::{resolve_env_var, ImageInput, ModelInfo, VisionService};
use super::retry::parse_duration_literal;
use crate::config::GeminiConfig;
use crate::error::{ApiError, AuthError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Gemini provider using `generateContent`.
pub struct GeminiService {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    /// Bound on first use and reused for the service's lifetime.
    client: OnceLock<reqwest::Client>,
}

impl GeminiService {
    pub fn new(api_key: &str, endpoint: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Create a service from config, with an optional key that overrides the
    /// configured one.
    pub fn from_config(config: &GeminiConfig, key_override: Option<&str>) -> Result<Self, AuthError> {
        let api_key = key_override
            .and_then(resolve_env_var)
            .or_else(|| resolve_env_var(&config.api_key))
            .ok_or_else(|| AuthError {
                details: "Gemini API key not set. Set GEMINI_API_KEY or run `exsolve config set-key`."
                    .to_string(),
            })?;
        Ok(Self::new(
            &api_key,
            &config.endpoint,
            Duration::from_millis(config.request_timeout_ms),
        ))
    }

    /// Bind the credential and HTTP client. Idempotent.
    fn bind(&self) -> Result<&reqwest::Client, ApiError> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::http(401, "API key is empty").with_status("UNAUTHENTICATED"));
        }
        Ok(self.client.get_or_init(|| {
            tracing::debug!("Binding Gemini client to {}", self.endpoint);
            reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to build configured HTTP client ({e}), using defaults");
                    reqwest::Client::new()
                })
        }))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(parse_error(status.as_u16(), &body))
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(rename = "@type", default)]
    type_url: String,
    reason: Option<String>,
    retry_delay: Option<String>,
}

/// Turn a non-success response body into a structured error.
pub(crate) fn parse_error(status_code: u16, body: &str) -> ApiError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ApiError::http(status_code, format!("Gemini HTTP {status_code}: {body}"));
    };
    let error = envelope.error;

    let mut message = format!("Gemini HTTP {status_code}: {}", error.message);
    let mut api_error = ApiError::http(status_code, String::new());

    for detail in &error.details {
        if detail.type_url.ends_with("RetryInfo") {
            if let Some(delay) = detail.retry_delay.as_deref().and_then(parse_duration_literal) {
                api_error = api_error.with_retry_after(delay);
            }
        }
        if let Some(reason) = &detail.reason {
            message.push_str(&format!(" (reason: {reason})"));
        }
    }

    if let Some(status) = error.status {
        api_error = api_error.with_status(status);
    }
    api_error.message = message;
    api_error
}

#[async_trait]
impl VisionService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let client = self.bind()?;
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = client
                .get(format!("{}/models", self.endpoint))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| ApiError::message(format!("Gemini request failed: {e}")))?;
            let page: ListModelsResponse = Self::check(resp).await?.json().await.map_err(|e| {
                ApiError::message(format!("Failed to parse Gemini model list: {e}"))
            })?;

            models.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                supported_generation_methods: m.supported_generation_methods,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Gemini lists {} models", models.len());
        Ok(models)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<String, ApiError> {
        let client = self.bind()?;
        let start = Instant::now();

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &image.media_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };

        let resp = client
            .post(format!("{}/{model}:generateContent", self.endpoint))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::message(format!("Gemini request failed: {e}")))?;

        let generated: GenerateResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::message(format!("Failed to parse Gemini response: {e}")))?;

        let text = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::message(
                "Gemini returned an empty response with no text content",
            ));
        }

        tracing::debug!(
            "{model} answered in {}ms",
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::retry::{classify, FailureKind};

    #[test]
    fn test_parse_quota_error() {
        let body = r#"{
          "error": {
            "code": 429,
            "message": "You exceeded your current quota.",
            "status": "RESOURCE_EXHAUSTED",
            "details": [
              {"@type": "type.googleapis.com/google.rpc.QuotaFailure", "violations": []},
              {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "37s"}
            ]
          }
        }"#;
        let err = parse_error(429, body);
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
        assert_eq!(err.retry_after, Some(Duration::from_secs(37)));
        assert_eq!(
            classify(&err),
            FailureKind::Throttled {
                retry_after: Some(Duration::from_secs(37))
            }
        );
    }

    #[test]
    fn test_parse_invalid_key_error() {
        let body = r#"{
          "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT",
            "details": [
              {"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID"}
            ]
          }
        }"#;
        let err = parse_error(400, body);
        assert!(err.message.contains("API_KEY_INVALID"));
        assert_eq!(classify(&err), FailureKind::Unauthorized);
    }

    #[test]
    fn test_parse_non_json_error() {
        let err = parse_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.status_code, Some(502));
        assert!(err.message.contains("Bad Gateway"));
        assert_eq!(classify(&err), FailureKind::Other);
    }

    #[test]
    fn test_request_serialization() {
        let image = ImageInput::from_bytes(&[1, 2, 3], "png");
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "solve" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &image.media_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "solve");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn test_model_list_deserialization() {
        let body = r#"{
          "models": [
            {"name": "models/gemini-1.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]}
          ],
          "nextPageToken": ""
        }"#;
        let page: ListModelsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.models.len(), 2);
        assert_eq!(page.models[0].name, "models/gemini-1.5-flash");
        assert_eq!(page.next_page_token.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_empty_key_fails_binding_as_unauthorized() {
        let service = GeminiService::new("", "http://127.0.0.1:9", Duration::from_secs(1));
        let err = service.list_models().await.unwrap_err();
        assert_eq!(classify(&err), FailureKind::Unauthorized);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = GeminiConfig {
            api_key: "${DEFINITELY_NOT_SET_XYZ_123}".to_string(),
            ..GeminiConfig::default()
        };
        assert!(GeminiService::from_config(&config, None).is_err());
        let service = GeminiService::from_config(&config, Some("session-key")).unwrap();
        assert_eq!(service.api_key, "session-key");
    }
}
