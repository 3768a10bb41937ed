//! The bounded concurrent request pipeline.
//!
//! - **discovery**: Expand input paths into an ordered image list
//! - **work**: Work items and the index-addressed result table
//! - **orchestrator**: Bounded fan-out under the shared rate limiter
//! - **progress**: Observational status notifications

pub mod discovery;
pub mod orchestrator;
pub mod progress;
pub mod work;

// Re-exports for convenient access
pub use discovery::{discover_images, DiscoveredFile, FileDiscovery, DEFAULT_EXTENSIONS};
pub use orchestrator::{Orchestrator, OrchestratorOptions, RunState};
pub use progress::{ChannelProgress, NoProgress, ProgressEvent, ProgressSink, TracingProgress};
pub use work::{ResultTable, WorkItem, WorkResult, ERROR_PREFIX};
