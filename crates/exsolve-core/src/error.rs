//! Error types for the exsolve pipeline.
//!
//! Errors are split by the level at which they are handled: item-level
//! failures ([`ServiceError`]) end up as error markers in the result table,
//! run-level failures ([`AuthError`], [`PipelineError`]) abort the whole run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for exsolve operations.
#[derive(Error, Debug)]
pub enum ExsolveError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Structural misuse of the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Credential rejected by the remote service
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Generation failed for a single input
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// A single failed call against the remote generation service.
///
/// Carries whatever structure the service returned so that
/// [`crate::llm::retry::classify`] does not have to guess from the message.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable error text
    pub message: String,
    /// HTTP status code, if the failure came from an HTTP response
    pub status_code: Option<u16>,
    /// RPC status string (e.g. "RESOURCE_EXHAUSTED"), if reported
    pub status: Option<String>,
    /// Retry delay suggested by the service, if any
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// An error with only a message (transport failures, parse failures).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            status: None,
            retry_after: None,
        }
    }

    /// An error from an HTTP response with a status code.
    pub fn http(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::message(message)
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

/// Generation for one input ultimately failed.
///
/// Recovered at the item level: the orchestrator records it as an
/// `"Error: ..."` result and carries on with the other inputs.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Model discovery succeeded but returned nothing usable
    #[error(
        "No Gemini vision models found. Please check your API key and ensure you have access to Gemini models."
    )]
    NoEligibleModels,

    /// Model discovery failed for a reason other than the credential
    #[error("Failed to list available models: {0}")]
    Discovery(String),

    /// Every eligible model exhausted its retry budget
    #[error("All Gemini vision models failed. Last error: {last_error}\n\nTried models: {}", .tried.join(", "))]
    Exhausted {
        last_error: String,
        tried: Vec<String>,
    },

    /// The input could not be read
    #[error("Failed to read image {path}: {message}")]
    Input { path: PathBuf, message: String },
}

/// The credential is invalid or expired.
///
/// Fatal for the whole run: every later call would fail the same way.
#[derive(Error, Debug, Clone)]
#[error(
    "API Key Error: Your API key is invalid or expired. Please check your API key in the settings.\n\nDetails: {details}"
)]
pub struct AuthError {
    pub details: String,
}

/// Structural misuse of the pipeline, raised before any work is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("empty input: no images to process")]
    EmptyInput,
}

/// Failure of [`crate::GenerationClient::generate`].
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Failure of a whole [`crate::Orchestrator::run`].
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<RunError> for ExsolveError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Pipeline(e) => Self::Pipeline(e),
            RunError::Auth(e) => Self::Auth(e),
        }
    }
}

/// Convenience type alias for exsolve results.
pub type Result<T> = std::result::Result<T, ExsolveError>;
