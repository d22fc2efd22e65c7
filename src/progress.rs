//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche aggregate di un batch.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` con una riga per oggetto
//! - `BatchReport`: conteggi per azione e delta di byte cumulativo
//!
//! ## Statistiche tracciate:
//! - **committed**: oggetti sostituiti e marcati
//! - **skipped_no_savings**: tool fallito o nessun risparmio
//! - **skipped_unsupported**: formato non gestito (non conta come errore)
//! - **failed**: errori per-oggetto (download, tool, upload)
//! - **byte_delta**: somma dei delta dei soli oggetti committati (negativo = risparmio)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================================] 150/150 (100%) photo.png: 20% saved
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::file_manager::FileManager;
use crate::outcome::{OptimizationOutcome, OutcomeAction};

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        // The template is a constant; a parse failure would be a programming error
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that draws nothing (JSON mode)
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Print a persistent line above the bar and advance it
    pub fn update(&self, line: &str, message: &str) {
        self.bar.println(line);
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Aggregated outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub committed: usize,
    pub skipped_no_savings: usize,
    pub skipped_unsupported: usize,
    pub failed: usize,
    /// Sum of `optimized - original` over committed objects
    pub byte_delta: i64,
    /// Sum of original sizes over every processed object
    pub total_original_size: u64,
    /// Per-object outcomes in discovery order
    pub outcomes: Vec<OptimizationOutcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduce a sequence of outcomes into a report
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = OptimizationOutcome>) -> Self {
        let mut report = Self::new();
        for outcome in outcomes {
            report.add(outcome);
        }
        report
    }

    pub fn add(&mut self, outcome: OptimizationOutcome) {
        match outcome.action {
            OutcomeAction::Committed => {
                self.committed += 1;
                self.byte_delta += outcome.byte_delta();
            }
            OutcomeAction::SkippedNoSavings => self.skipped_no_savings += 1,
            OutcomeAction::SkippedUnsupportedFormat => self.skipped_unsupported += 1,
            OutcomeAction::Failed => self.failed += 1,
        }
        self.total_original_size += outcome.original_size;
        self.outcomes.push(outcome);
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Bytes removed from the container by this batch
    pub fn bytes_saved(&self) -> u64 {
        self.byte_delta.min(0).unsigned_abs()
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.bytes_saved() as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Committed: {} | No savings: {} | Unsupported: {} | Failed: {} | Total saved: {} ({:.2}%)",
            self.processed(),
            self.committed,
            self.skipped_no_savings,
            self.skipped_unsupported,
            self.failed,
            FileManager::format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}
