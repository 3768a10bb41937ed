//! Exsolve Core - rate-limited concurrent vision pipeline.
//!
//! Exsolve sends exercise images to a vision-capable generation service and
//! collects one answer per image, in input order.
//!
//! # Architecture
//!
//! ```text
//! Session → WorkItems → Orchestrator ─┬─ RateLimiter (sliding window)
//!                                     └─ GenerationClient (retry + model fallback)
//!                                          → ResultTable → AnswerDocument
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use exsolve_core::{Config, Exsolver, Session, TracingProgress};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> exsolve_core::Result<()> {
//!     let config = Config::load()?;
//!     let exsolver = Exsolver::new(config, None)?;
//!
//!     let mut session = Session::new("Ana Pop", "10B");
//!     session.add_image("./page_1.png");
//!
//!     let results = exsolver.run(&session, Arc::new(TracingProgress)).await?;
//!     println!("{} answers, {} errors", results.len(), results.error_count());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod limiter;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod text;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    ApiError, AuthError, ClientError, ConfigError, ExsolveError, PipelineError, Result, RunError,
    ServiceError,
};
pub use limiter::RateLimiter;
pub use llm::{GeminiService, GenerationClient, RetryPolicy, VisionService};
pub use output::{AnswerDocument, DocumentFormat};
pub use pipeline::{
    ChannelProgress, NoProgress, Orchestrator, OrchestratorOptions, ProgressEvent, ProgressSink,
    ResultTable, TracingProgress, WorkItem, WorkResult,
};
pub use session::Session;

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exsolve processor - the main entry point.
///
/// Owns one rate limiter and one generation client, shared by every run made
/// through it.
pub struct Exsolver {
    config: Config,
    client: Arc<GenerationClient>,
    limiter: Arc<RateLimiter>,
    orchestrator: Orchestrator,
}

impl Exsolver {
    /// Create an instance talking to Gemini.
    ///
    /// `api_key` overrides `gemini.api_key` from the config.
    pub fn new(config: Config, api_key: Option<&str>) -> Result<Self> {
        let service = GeminiService::from_config(&config.gemini, api_key)?;
        Self::with_service(config, Arc::new(service))
    }

    /// Create an instance over any vision service.
    pub fn with_service(config: Config, service: Arc<dyn VisionService>) -> Result<Self> {
        tracing::debug!("Initializing Exsolve v{} with {}", VERSION, service.name());
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window(),
        )?);
        let client = Arc::new(GenerationClient::new(
            service,
            RetryPolicy::from_config(&config.gemini),
        ));
        let orchestrator = Orchestrator::new(
            client.clone(),
            limiter.clone(),
            OrchestratorOptions::from_config(&config),
        );
        Ok(Self {
            config,
            client,
            limiter,
            orchestrator,
        })
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Eligible vision models, in fallback order.
    pub async fn models(&self) -> std::result::Result<Vec<String>, ClientError> {
        self.client.models().await.map(<[String]>::to_vec)
    }

    /// Answer every image in `session`.
    pub async fn run(&self, session: &Session, sink: Arc<dyn ProgressSink>) -> Result<ResultTable> {
        Ok(self.orchestrator.run(session.snapshot(), sink).await?)
    }
}
