//! Remote generation service integration.
//!
//! Provides the vision service abstraction, the Gemini REST implementation,
//! failure classification, and the generation client that layers retries
//! and model fallback on top.

pub(crate) mod client;
pub(crate) mod gemini;
pub(crate) mod provider;
pub mod retry;

pub use client::GenerationClient;
pub use gemini::GeminiService;
pub use provider::{build_prompt, ImageInput, ModelInfo, VisionService, BASE_PROMPT};
pub use retry::{FailureKind, RetryPolicy};
