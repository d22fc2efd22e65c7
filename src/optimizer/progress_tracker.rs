//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso dai worker: per ogni oggetto completato
//! stampa la riga di progresso (progress bar o evento JSON) e aggiorna i
//! contatori. Il report finale invece è ridotto dagli esiti in ordine di
//! discovery, non da questi contatori.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::json_output::JsonMessage;
use crate::outcome::{OptimizationOutcome, OutcomeAction};
use crate::progress::ProgressManager;
use crate::utils::short_name;

#[derive(Debug, Default)]
struct Counters {
    completed: usize,
    committed: usize,
    failed: usize,
}

/// Shared progress reporter for one batch
#[derive(Clone)]
pub struct ProgressTracker {
    pub total: usize,
    json_output: bool,
    counters: Arc<Mutex<Counters>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker
    pub fn new(total: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden()
        } else {
            ProgressManager::new(total as u64)
        };
        Self {
            total,
            json_output,
            counters: Arc::new(Mutex::new(Counters::default())),
            progress_manager,
        }
    }

    /// Report one finished object
    pub async fn record(&self, outcome: &OptimizationOutcome) {
        let current = {
            let mut counters = self.counters.lock().await;
            counters.completed += 1;
            match outcome.action {
                OutcomeAction::Committed => counters.committed += 1,
                OutcomeAction::Failed => counters.failed += 1,
                _ => {}
            }
            counters.completed
        };

        if self.json_output {
            JsonMessage::file_complete(outcome).emit();
            JsonMessage::progress(current, self.total).emit();
            return;
        }

        let line = outcome.progress_line();
        match outcome.action {
            OutcomeAction::Failed => warn!("{}", line),
            _ => info!("{}", line),
        }

        let status = match outcome.action {
            OutcomeAction::Committed => format!("[OK] {}: {}% saved", short_name(&outcome.name), outcome.savings_percent),
            OutcomeAction::SkippedNoSavings => format!("[SKIP] {}: no savings", short_name(&outcome.name)),
            OutcomeAction::SkippedUnsupportedFormat => format!("[SKIP] {}: unsupported", short_name(&outcome.name)),
            OutcomeAction::Failed => format!("[ERROR] {}", short_name(&outcome.name)),
        };
        self.progress_manager.update(&line, &status);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// (completed, committed, failed) so far
    pub async fn snapshot(&self) -> (usize, usize, usize) {
        let counters = self.counters.lock().await;
        (counters.completed, counters.committed, counters.failed)
    }
}
