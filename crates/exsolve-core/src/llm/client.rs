//! Generation client: one answer per image, with model fallback.
//!
//! The client discovers the eligible models once, then walks them in
//! discovery order. Throttled calls are retried on the same model up to the
//! policy's budget; any other failure moves on to the next model.

use super::provider::{build_prompt, ImageInput, VisionService};
use super::retry::{self, FailureKind, RetryPolicy};
use crate::error::{AuthError, ClientError, ServiceError};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Produces a single text answer per image, hiding throttling and model
/// availability from the caller.
///
/// One client is shared by all workers of a run; the model cache is
/// populated at most once behind its own lock.
pub struct GenerationClient {
    service: Arc<dyn VisionService>,
    policy: RetryPolicy,
    models: OnceCell<Vec<String>>,
}

impl GenerationClient {
    pub fn new(service: Arc<dyn VisionService>, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            models: OnceCell::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Eligible model ids in discovery order.
    ///
    /// Discovered on first use and cached for the client's lifetime. A failed
    /// discovery is not cached, so the next caller tries again.
    pub async fn models(&self) -> Result<&[String], ClientError> {
        self.models
            .get_or_try_init(|| self.discover())
            .await
            .map(Vec::as_slice)
    }

    async fn discover(&self) -> Result<Vec<String>, ClientError> {
        let listed = self.service.list_models().await.map_err(|e| {
            if retry::classify(&e) == FailureKind::Unauthorized || retry::is_access_denied(&e) {
                ClientError::Auth(AuthError { details: e.message })
            } else {
                ClientError::Service(ServiceError::Discovery(e.to_string()))
            }
        })?;

        let eligible: Vec<String> = listed
            .into_iter()
            .filter(|m| m.is_vision_candidate())
            .map(|m| m.name)
            .collect();

        if eligible.is_empty() {
            return Err(ServiceError::NoEligibleModels.into());
        }
        tracing::info!(
            "Using {} {} vision model(s): {}",
            eligible.len(),
            self.service.name(),
            eligible.join(", ")
        );
        Ok(eligible)
    }

    /// Read an image from disk and answer it.
    pub async fn generate_for_path(
        &self,
        path: &Path,
        instructions: Option<&str>,
    ) -> Result<String, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ServiceError::Input {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let image = ImageInput::from_path_bytes(&bytes, path);
        self.generate(&image, instructions).await
    }

    /// Answer one image.
    ///
    /// Fails with [`ClientError::Service`] when every model is exhausted and
    /// with [`ClientError::Auth`] as soon as the credential is rejected.
    pub async fn generate(
        &self,
        image: &ImageInput,
        instructions: Option<&str>,
    ) -> Result<String, ClientError> {
        let prompt = build_prompt(instructions);
        let models = self.models().await?;
        let max_attempts = self.policy.max_retries.max(1);
        let mut last_error = String::new();

        for model in models {
            for attempt in 1..=max_attempts {
                let err = match self.service.generate(model, &prompt, image).await {
                    Ok(text) => return Ok(text),
                    Err(err) => err,
                };
                last_error = err.to_string();

                match retry::classify(&err) {
                    FailureKind::Throttled { retry_after } if attempt < max_attempts => {
                        let delay = self.policy.delay_for(retry_after);
                        tracing::debug!(
                            "{model} throttled (attempt {attempt}/{max_attempts}), retrying in {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    FailureKind::Throttled { .. } => {
                        tracing::debug!("{model} still throttled after {max_attempts} attempts");
                        break;
                    }
                    FailureKind::Unauthorized => {
                        return Err(AuthError {
                            details: err.message,
                        }
                        .into());
                    }
                    FailureKind::Unavailable => {
                        tracing::debug!("{model} unavailable: {last_error}");
                        break;
                    }
                    // TODO: allow one retry here before falling back; transient
                    // network errors currently cost a whole model.
                    FailureKind::Other => {
                        tracing::warn!("{model} failed: {last_error}");
                        break;
                    }
                }
            }
        }

        Err(ServiceError::Exhausted {
            last_error,
            tried: models.to_vec(),
        }
        .into())
    }
}
