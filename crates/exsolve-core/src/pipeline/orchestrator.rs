//! Bounded concurrent fan-out of work items under the shared rate limiter.
//!
//! Every item is spawned onto a `JoinSet` up front and waits for one of the
//! run's worker permits (semaphore). A worker then takes a rate-limit slot,
//! calls the generation client and hands back a result for its index. The
//! orchestrator is the only writer of the result table.
//!
//! An [`AuthError`] from any worker aborts the run: the semaphore is closed so
//! waiting items never start, in-flight calls are detached and their results
//! dropped, and the error is returned instead of a table.

use crate::config::Config;
use crate::error::{AuthError, ClientError, PipelineError, RunError};
use crate::limiter::RateLimiter;
use crate::llm::GenerationClient;
use crate::pipeline::progress::ProgressSink;
use crate::pipeline::work::{ResultTable, WorkItem, WorkResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Worker pool settings for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Ceiling on concurrent workers
    pub max_workers: usize,
    /// How long a worker waits for a rate-limit slot
    pub acquire_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_workers: 5,
            acquire_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.pipeline.max_workers,
            acquire_timeout: config.acquire_timeout(),
        }
    }
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Dispatching,
    Completed,
    Aborting,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Dispatching)
                | (RunState::Dispatching, RunState::Completed)
                | (RunState::Dispatching, RunState::Aborting)
                | (RunState::Aborting, RunState::Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// Fans work items out over a bounded worker pool.
pub struct Orchestrator {
    client: Arc<GenerationClient>,
    limiter: Arc<RateLimiter>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        client: Arc<GenerationClient>,
        limiter: Arc<RateLimiter>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            client,
            limiter,
            options,
        }
    }

    /// Concurrency for `items` inputs: bounded by the configured ceiling, the
    /// quota available right now, and the number of items. Never below 1, so
    /// a run can always progress.
    pub fn worker_count(&self, items: usize) -> usize {
        self.options
            .max_workers
            .min(self.limiter.available_slots())
            .min(items)
            .max(1)
    }

    /// Answer every item, returning results in input order.
    ///
    /// Item indices are assigned from their position in `items`. Per-item
    /// failures become `"Error: ..."` results; only an authorization failure
    /// fails the run.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ResultTable, RunError> {
        Run::new(self, items, sink).execute().await
    }
}

/// What a worker task hands back to the orchestrator.
enum Outcome {
    Finished(WorkResult),
    Cancelled,
    Fatal(AuthError),
}

/// State shared by the worker tasks of one run.
struct WorkerContext {
    client: Arc<GenerationClient>,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn ProgressSink>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    total: usize,
    completed: AtomicUsize,
}

impl WorkerContext {
    async fn process(&self, item: WorkItem) -> Outcome {
        if !self.limiter.acquire(Some(self.acquire_timeout)).await {
            self.record_failure(item.index, "Rate limit timeout");
            return Outcome::Finished(WorkResult::error(item.index, "Rate limit timeout"));
        }
        // The run was aborted while this item waited for quota
        if self.permits.is_closed() {
            return Outcome::Cancelled;
        }

        self.sink.on_status(&format!(
            "Processing image {} of {}: {}",
            item.index + 1,
            self.total,
            item.display_name()
        ));

        match self
            .client
            .generate_for_path(&item.input, item.instructions.as_deref())
            .await
        {
            Ok(answer) => {
                let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.sink.on_status(&format!(
                    "✓ Completed {done}/{} images ({} slots remaining)",
                    self.total,
                    self.limiter.available_slots()
                ));
                Outcome::Finished(WorkResult::answer(item.index, answer))
            }
            Err(ClientError::Service(err)) => {
                let message = err.to_string();
                tracing::warn!("Image {} failed: {message}", item.index + 1);
                self.record_failure(item.index, &message);
                Outcome::Finished(WorkResult::error(item.index, message))
            }
            Err(ClientError::Auth(err)) => Outcome::Fatal(err),
        }
    }

    fn record_failure(&self, index: usize, message: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        let short: String = message.chars().take(80).collect();
        self.sink
            .on_status(&format!("✗ Error processing image {}: {short}", index + 1));
    }
}

/// One execution of the pipeline. Consumed by [`Run::execute`].
struct Run<'a> {
    orchestrator: &'a Orchestrator,
    items: Vec<WorkItem>,
    sink: Arc<dyn ProgressSink>,
    state: RunState,
}

impl<'a> Run<'a> {
    fn new(orchestrator: &'a Orchestrator, items: Vec<WorkItem>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            orchestrator,
            items,
            sink,
            state: RunState::Idle,
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn execute(mut self) -> Result<ResultTable, RunError> {
        let total = self.items.len();
        if total == 0 {
            return Err(PipelineError::EmptyInput.into());
        }

        let orchestrator = self.orchestrator;
        let workers = orchestrator.worker_count(total);
        let limiter = &orchestrator.limiter;
        self.transition(RunState::Dispatching);
        self.sink.on_status(&format!(
            "Processing {total} images in parallel ({workers} concurrent workers, {} requests/{}s limit)...",
            limiter.max_requests(),
            limiter.time_window().as_secs_f64()
        ));

        let permits = Arc::new(Semaphore::new(workers));
        let context = Arc::new(WorkerContext {
            client: orchestrator.client.clone(),
            limiter: limiter.clone(),
            sink: self.sink.clone(),
            permits: permits.clone(),
            acquire_timeout: orchestrator.options.acquire_timeout,
            total,
            completed: AtomicUsize::new(0),
        });

        let mut tasks = JoinSet::new();
        for (index, mut item) in std::mem::take(&mut self.items).into_iter().enumerate() {
            item.index = index;
            let context = context.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Outcome::Cancelled;
                };
                let worker = context.clone();
                match tokio::spawn(async move { worker.process(item).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = format!("worker task failed: {e}");
                        context.record_failure(index, &message);
                        Outcome::Finished(WorkResult::error(index, message))
                    }
                }
            });
        }

        let mut table = ResultTable::with_len(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Finished(result)) => {
                    let index = result.index;
                    if table.fill(result) {
                        self.sink.on_item_done(index);
                    } else {
                        tracing::warn!("Dropping duplicate result for item {index}");
                    }
                }
                Ok(Outcome::Cancelled) => {}
                Ok(Outcome::Fatal(err)) => {
                    self.transition(RunState::Aborting);
                    permits.close();
                    tasks.detach_all();
                    self.sink.on_status(&format!("Error: {err}"));
                    self.transition(RunState::Aborted);
                    return Err(err.into());
                }
                Err(e) => {
                    tracing::error!("Worker task failed: {e}");
                }
            }
        }

        // Only reachable if the dispatch wrapper itself failed
        for index in 0..total {
            if table.get(index).is_none() {
                table.fill(WorkResult::error(index, "worker task failed"));
                self.sink.on_item_done(index);
            }
        }

        self.transition(RunState::Completed);
        self.sink
            .on_status(&format!("Finished processing all {total} images"));
        Ok(table)
    }
}
