//! # Optimization Outcome Module
//!
//! Il risultato di una pipeline per un singolo oggetto.
//!
//! ## Azioni possibili:
//! - `Committed`: contenuto e metadata remoti sostituiti (con il marker)
//! - `SkippedNoSavings`: tool fallito o file non più piccolo, oggetto intatto
//! - `SkippedUnsupportedFormat`: nessun adapter per il formato, oggetto intatto
//! - `Failed`: download, invocazione o upload falliti, oggetto intatto
//!
//! Invariante: `Committed` implica `optimized_size <= original_size`.

use serde::Serialize;

use crate::error::OptimizeError;
use crate::file_manager::FileManager;

/// Terminal action of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeAction {
    Committed,
    SkippedNoSavings,
    SkippedUnsupportedFormat,
    Failed,
}

impl OutcomeAction {
    /// Whether the remote object was modified
    pub fn mutated_remote(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationOutcome {
    pub name: String,
    pub original_size: u64,
    pub optimized_size: u64,
    pub savings_percent: i64,
    pub action: OutcomeAction,
    /// Failure reason, set only for `Failed`
    pub error: Option<String>,
}

impl OptimizationOutcome {
    fn new(name: &str, original_size: u64, optimized_size: u64, action: OutcomeAction) -> Self {
        Self {
            name: name.to_string(),
            original_size,
            optimized_size,
            savings_percent: FileManager::savings_percent(original_size, optimized_size),
            action,
            error: None,
        }
    }

    pub fn committed(name: &str, original_size: u64, optimized_size: u64) -> Self {
        debug_assert!(optimized_size <= original_size);
        Self::new(name, original_size, optimized_size, OutcomeAction::Committed)
    }

    pub fn skipped_no_savings(name: &str, original_size: u64, optimized_size: u64) -> Self {
        Self::new(name, original_size, optimized_size, OutcomeAction::SkippedNoSavings)
    }

    pub fn unsupported(name: &str, size: u64) -> Self {
        Self::new(name, size, size, OutcomeAction::SkippedUnsupportedFormat)
    }

    pub fn failed(name: &str, size: u64, error: &OptimizeError) -> Self {
        let mut outcome = Self::new(name, size, size, OutcomeAction::Failed);
        outcome.error = Some(format!("{}: {}", error.kind(), error));
        outcome
    }

    /// Measured size change (`optimized - original`); negative means smaller
    pub fn byte_delta(&self) -> i64 {
        self.optimized_size as i64 - self.original_size as i64
    }

    /// One-line human report for this object
    pub fn progress_line(&self) -> String {
        match self.action {
            OutcomeAction::Committed => format!(
                "{}: {} -> {} bytes ({}, {}% saved)",
                self.name,
                self.original_size,
                self.optimized_size,
                self.byte_delta(),
                self.savings_percent
            ),
            OutcomeAction::SkippedNoSavings if self.savings_percent < 0 => format!(
                "{}: {} -> {} bytes ({:+}, ignored)",
                self.name,
                self.original_size,
                self.optimized_size,
                self.byte_delta()
            ),
            OutcomeAction::SkippedNoSavings => format!(
                "{}: {} -> {} bytes ({:+}, {}% - not optimized, left unchanged)",
                self.name,
                self.original_size,
                self.optimized_size,
                self.byte_delta(),
                self.savings_percent
            ),
            OutcomeAction::SkippedUnsupportedFormat => {
                format!("{}: unsupported format, skipped", self.name)
            }
            OutcomeAction::Failed => format!(
                "{}: failed ({})",
                self.name,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_line_reports_delta_and_percent() {
        let outcome = OptimizationOutcome::committed("photo.png", 10_000, 8_000);
        assert_eq!(outcome.savings_percent, 20);
        assert_eq!(outcome.byte_delta(), -2_000);
        assert_eq!(outcome.progress_line(), "photo.png: 10000 -> 8000 bytes (-2000, 20% saved)");
    }

    #[test]
    fn test_negative_savings_reported_as_ignored() {
        let outcome = OptimizationOutcome::skipped_no_savings("photo.jpg", 5_000, 5_200);
        assert_eq!(outcome.savings_percent, -4);
        assert!(outcome.progress_line().ends_with("(+200, ignored)"));
        assert!(!outcome.action.mutated_remote());
    }

    #[test]
    fn test_failed_carries_error_kind() {
        let err = OptimizeError::Upload { name: "a.png".into(), reason: "503".into() };
        let outcome = OptimizationOutcome::failed("a.png", 42, &err);
        assert_eq!(outcome.optimized_size, 42);
        assert!(outcome.error.as_deref().unwrap().starts_with("upload_failure"));
    }
}
