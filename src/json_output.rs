//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (una riga per evento)
//! per chi invoca l'optimizer da script o da un'altra applicazione.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del run sul container
//! - `file_complete`: Fine elaborazione di un oggetto
//! - `progress`: Contatori correnti
//! - `complete`: Fine del batch con statistiche finali
//! - `early_exit`: Run terminato senza modifiche (nessun candidato, rifiuto, ...)
//! - `error`: Errore fatale

use serde::Serialize;

use crate::outcome::{OptimizationOutcome, OutcomeAction};
use crate::progress::BatchReport;
use crate::storage::ContainerRef;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del run
    Start {
        container: String,
        extensions: Vec<String>,
        workers: usize,
    },

    /// Fine elaborazione di un oggetto
    FileComplete {
        name: String,
        original_size: u64,
        optimized_size: u64,
        byte_delta: i64,
        savings_percent: i64,
        action: OutcomeAction,
        error: Option<String>,
    },

    /// Progresso corrente
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
    },

    /// Batch completato
    Complete {
        committed: usize,
        skipped_no_savings: usize,
        skipped_unsupported: usize,
        failed: usize,
        bytes_saved: u64,
        duration_seconds: f64,
    },

    /// Run terminato in anticipo senza modifiche
    EarlyExit {
        reason: String,
        message: String,
        exit_code: i32,
    },

    /// Errore fatale
    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(container: &ContainerRef, extensions: &[String], workers: usize) -> Self {
        Self::Start {
            container: container.to_string(),
            extensions: extensions.to_vec(),
            workers,
        }
    }

    pub fn file_complete(outcome: &OptimizationOutcome) -> Self {
        Self::FileComplete {
            name: outcome.name.clone(),
            original_size: outcome.original_size,
            optimized_size: outcome.optimized_size,
            byte_delta: outcome.byte_delta(),
            savings_percent: outcome.savings_percent,
            action: outcome.action,
            error: outcome.error.clone(),
        }
    }

    pub fn progress(current: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self::Progress {
            current,
            total,
            percentage,
        }
    }

    pub fn complete(report: &BatchReport, duration_seconds: f64) -> Self {
        Self::Complete {
            committed: report.committed,
            skipped_no_savings: report.skipped_no_savings,
            skipped_unsupported: report.skipped_unsupported,
            failed: report.failed,
            bytes_saved: report.bytes_saved(),
            duration_seconds,
        }
    }

    pub fn early_exit(reason: &str, message: String, exit_code: i32) -> Self {
        Self::EarlyExit {
            reason: reason.to_string(),
            message,
            exit_code,
        }
    }

    pub fn error(message: String) -> Self {
        Self::Error { message }
    }
}
