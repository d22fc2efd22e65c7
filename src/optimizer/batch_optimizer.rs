//! # Batch Optimizer
//!
//! Orchestratore principale di un run su un singolo container.
//!
//! ## Flusso di esecuzione:
//! 1. **Discovery**: il selector elenca le immagini e scarta quelle marcate
//! 2. **Uscite anticipate**: nessuna immagine / tutte già ottimizzate
//! 3. **Conferma**: una sola decisione per tutto il batch, prima di ogni modifica
//! 4. **Processing**: una pipeline per candidato, in ordine di discovery
//! 5. **Reporting**: riga per oggetto e riepilogo finale
//!
//! ## Concorrenza:
//! - `workers = 1`: completamente sequenziale
//! - `workers > 1`: pool limitato da semaforo; gli esiti sono raccolti e
//!   ridotti alla fine nell'ordine di discovery
//!
//! ## Error handling:
//! - Errori (e panic) di un oggetto non fermano il batch
//! - La cancellazione è cooperativa e controllata tra un candidato e l'altro

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use crate::image_processor::AdapterRegistry;
use crate::json_output::JsonMessage;
use crate::optimizer::confirm::{BatchConfirmation, BatchSummary, StdinConfirm};
use crate::optimizer::pipeline::ObjectPipeline;
use crate::optimizer::progress_tracker::ProgressTracker;
use crate::optimizer::selector::{CandidateSelector, Selection};
use crate::outcome::OptimizationOutcome;
use crate::progress::BatchReport;
use crate::storage::{ContainerRef, ObjectStore, RemoteObject};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every candidate went through the pipeline
    Completed(BatchReport),
    /// Nothing in the container matched the image extensions
    NoCandidateImages,
    /// Every image already carries the marker
    AllAlreadyOptimized { total: usize },
    /// The batch confirmation was declined; nothing was modified
    UserDeclined { candidates: usize },
    /// Stopped between candidates; the report covers what was processed
    Cancelled(BatchReport),
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(_) => 0,
            Self::NoCandidateImages => 2,
            Self::AllAlreadyOptimized { .. } => 3,
            Self::UserDeclined { .. } => 4,
            Self::Cancelled(_) => 5,
        }
    }

    /// Stable tag for logs and JSON output
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::NoCandidateImages => "no_candidate_images",
            Self::AllAlreadyOptimized { .. } => "all_already_optimized",
            Self::UserDeclined { .. } => "user_declined",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Completed(report) => format!("Optimization complete. {}", report.format_summary()),
            Self::NoCandidateImages => "No candidate images found in the container".to_string(),
            Self::AllAlreadyOptimized { total } => {
                format!("All {} images in the container are already optimized", total)
            }
            Self::UserDeclined { candidates } => {
                format!("Batch declined, {} images left untouched", candidates)
            }
            Self::Cancelled(report) => format!("Cancelled after {} objects. {}", report.processed(), report.format_summary()),
        }
    }

    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => Some(report),
            _ => None,
        }
    }
}

/// Drives selection, confirmation and the per-object pipelines
pub struct BatchOptimizer {
    config: Config,
    container: ContainerRef,
    store: Arc<dyn ObjectStore>,
    registry: AdapterRegistry,
    confirmation: Box<dyn BatchConfirmation>,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl BatchOptimizer {
    pub fn new(config: Config, container: ContainerRef, store: Arc<dyn ObjectStore>, registry: AdapterRegistry) -> Self {
        Self {
            config,
            container,
            store,
            registry,
            confirmation: Box::new(StdinConfirm),
            stop_receiver: None,
        }
    }

    /// Replace the terminal prompt used when `confirm_batch` is set
    pub fn with_confirmation(mut self, confirmation: Box<dyn BatchConfirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Stop between candidates once a signal arrives on `stop_receiver`
    pub fn with_cancellation(mut self, stop_receiver: broadcast::Receiver<()>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    /// Channel pair for [`with_cancellation`](Self::with_cancellation)
    pub fn create_cancellation_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(1)
    }

    /// Checks if a stop signal has been received
    fn should_stop(&mut self) -> bool {
        let Some(ref mut receiver) = self.stop_receiver else {
            return false;
        };
        match receiver.try_recv() {
            Ok(()) => true,
            Err(broadcast::error::TryRecvError::Empty) => false,
            // Signal was sent but we missed it, treat as stop
            Err(broadcast::error::TryRecvError::Lagged(_)) => true,
            // Sender dropped without signalling
            Err(broadcast::error::TryRecvError::Closed) => false,
        }
    }

    /// Execute the run
    pub async fn run(&mut self) -> Result<RunStatus> {
        let start_time = Instant::now();
        self.emit_start_message();

        let selection = CandidateSelector::new(self.store.as_ref(), &self.config.extensions)
            .select(&self.container)
            .await?;
        let candidates = match selection {
            Selection::Candidates(candidates) => candidates,
            Selection::NoCandidateImages => return Ok(self.finish_early(RunStatus::NoCandidateImages)),
            Selection::AllAlreadyOptimized { total } => {
                return Ok(self.finish_early(RunStatus::AllAlreadyOptimized { total }))
            }
        };

        if self.config.confirm_batch {
            let summary = BatchSummary {
                container: self.container.clone(),
                candidates: candidates.len(),
                total_bytes: candidates.iter().map(|c| c.size).sum(),
            };
            if !self.confirmation.confirm(&summary).await {
                return Ok(self.finish_early(RunStatus::UserDeclined {
                    candidates: candidates.len(),
                }));
            }
        }

        let pipeline = ObjectPipeline::new(self.store.clone(), self.container.clone(), self.registry.clone())
            .with_conditional_commit(self.config.conditional_commit)
            .with_scratch_dir(self.config.scratch_dir.clone());
        let tracker = ProgressTracker::new(candidates.len(), self.config.json_output);

        let (outcomes, cancelled) = if self.config.workers <= 1 {
            self.process_sequentially(&pipeline, candidates, &tracker).await
        } else {
            self.process_concurrently(&pipeline, candidates, &tracker).await
        };

        let report = BatchReport::from_outcomes(outcomes);
        tracker.finish(&report.format_summary());
        self.print_final_stats(&report, start_time.elapsed().as_secs_f64());

        let status = if cancelled {
            RunStatus::Cancelled(report)
        } else {
            RunStatus::Completed(report)
        };
        if cancelled && self.config.json_output {
            JsonMessage::early_exit(status.reason(), status.message(), status.exit_code()).emit();
        }
        Ok(status)
    }

    async fn process_sequentially(
        &mut self,
        pipeline: &ObjectPipeline,
        candidates: Vec<RemoteObject>,
        tracker: &ProgressTracker,
    ) -> (Vec<OptimizationOutcome>, bool) {
        let mut outcomes = Vec::with_capacity(candidates.len());

        for object in candidates {
            if self.should_stop() {
                info!("Cancellation requested, stopping before {}", object.name);
                return (outcomes, true);
            }

            let outcome = match AssertUnwindSafe(pipeline.process(&object)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Pipeline panicked on {}", object.name);
                    OptimizationOutcome::failed(
                        &object.name,
                        object.size,
                        &OptimizeError::Worker("pipeline panicked".to_string()),
                    )
                }
            };
            tracker.record(&outcome).await;
            outcomes.push(outcome);
        }

        (outcomes, false)
    }

    async fn process_concurrently(
        &mut self,
        pipeline: &ObjectPipeline,
        candidates: Vec<RemoteObject>,
        tracker: &ProgressTracker,
    ) -> (Vec<OptimizationOutcome>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = Vec::with_capacity(candidates.len());
        let mut cancelled = false;

        for object in candidates {
            if self.should_stop() {
                info!("Cancellation requested, not starting {}", object.name);
                cancelled = true;
                break;
            }

            // Acquire before spawning so at most `workers` pipelines exist at once
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                cancelled = true;
                break;
            };

            // The wait for a permit can be long; a stop may have arrived meanwhile
            if self.should_stop() {
                info!("Cancellation requested, not starting {}", object.name);
                drop(permit);
                cancelled = true;
                break;
            }

            let name = object.name.clone();
            let size = object.size;
            let pipeline = pipeline.clone();
            let task_tracker = tracker.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = pipeline.process(&object).await;
                task_tracker.record(&outcome).await;
                outcome
            });
            tasks.push((name, size, handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, size, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Worker for {} failed: {}", name, e);
                    let outcome =
                        OptimizationOutcome::failed(&name, size, &OptimizeError::Worker(e.to_string()));
                    tracker.record(&outcome).await;
                    outcome
                }
            };
            outcomes.push(outcome);
        }

        (outcomes, cancelled)
    }

    /// Invia messaggio di inizio
    fn emit_start_message(&self) {
        if self.config.json_output {
            JsonMessage::start(&self.container, &self.config.extensions, self.config.workers).emit();
        } else {
            info!("Starting image optimization in: {}", self.container);
            info!(
                "Extensions: {} | Workers: {} | Commit: {}",
                self.config.extensions.join(", "),
                self.config.workers,
                if self.config.conditional_commit {
                    "only if unchanged"
                } else {
                    "overwrite"
                }
            );
        }
    }

    /// Report an early exit and hand the status back
    fn finish_early(&self, status: RunStatus) -> RunStatus {
        if self.config.json_output {
            JsonMessage::early_exit(status.reason(), status.message(), status.exit_code()).emit();
        } else {
            info!("{}", status.message());
        }
        status
    }

    fn print_final_stats(&self, report: &BatchReport, duration_seconds: f64) {
        if self.config.json_output {
            JsonMessage::complete(report, duration_seconds).emit();
            return;
        }

        info!("Completed in {:.2}s", duration_seconds);
        info!("{}", report.format_summary());
        info!("Cumulative byte delta: {}", FileManager::format_delta(report.byte_delta));

        if report.failed > 0 {
            warn!("{} objects failed and were left unchanged:", report.failed);
            for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
                warn!("  • {}: {}", outcome.name, outcome.error.as_deref().unwrap_or_default());
            }
        }
    }
}
