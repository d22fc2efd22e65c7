//! Batch confirmation gate.
//!
//! A single go/no-go decision for the whole batch, asked before the first
//! mutation. Declining ends the run with nothing touched.

use async_trait::async_trait;
use std::io::{IsTerminal, Write};
use tracing::warn;

use crate::file_manager::FileManager;
use crate::storage::ContainerRef;

/// What the user is asked to approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub container: ContainerRef,
    pub candidates: usize,
    pub total_bytes: u64,
}

impl BatchSummary {
    pub fn prompt(&self) -> String {
        format!(
            "Optimize {} images ({}) in {} and overwrite them in place? [y/N] ",
            self.candidates,
            FileManager::format_size(self.total_bytes),
            self.container
        )
    }
}

/// Decides whether a batch may proceed
#[async_trait]
pub trait BatchConfirmation: Send + Sync {
    async fn confirm(&self, summary: &BatchSummary) -> bool;
}

/// Always proceeds (`--yes`, or `confirm_batch = false`)
pub struct AutoConfirm;

#[async_trait]
impl BatchConfirmation for AutoConfirm {
    async fn confirm(&self, _summary: &BatchSummary) -> bool {
        true
    }
}

/// Asks on the terminal; anything but `y`/`yes` declines
pub struct StdinConfirm;

impl StdinConfirm {
    fn is_yes(answer: &str) -> bool {
        let answer = answer.trim();
        answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
    }
}

#[async_trait]
impl BatchConfirmation for StdinConfirm {
    async fn confirm(&self, summary: &BatchSummary) -> bool {
        if !std::io::stdin().is_terminal() {
            warn!("Confirmation required but stdin is not a terminal; pass --yes to run unattended");
            return false;
        }

        let prompt = summary.prompt();
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            stderr.write_all(prompt.as_bytes())?;
            stderr.flush()?;
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            Ok(input)
        })
        .await;

        match answer {
            Ok(Ok(input)) => Self::is_yes(&input),
            Ok(Err(e)) => {
                warn!("Could not read confirmation: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation prompt aborted: {}", e);
                false
            }
        }
    }
}
