//! # Optimizer Module
//!
//! Modulo che separa le responsabilità in sottomoduli:
//! - `batch_optimizer`: Orchestratore del batch
//! - `pipeline`: Pipeline per singolo oggetto
//! - `selector`: Discovery e filtro dei candidati
//! - `confirm`: Conferma unica prima delle modifiche
//! - `progress_tracker`: Gestione progress condivisa tra i worker
//! - `working_copy`: File locale effimero per oggetto

pub mod batch_optimizer;
pub mod confirm;
pub mod pipeline;
pub mod progress_tracker;
pub mod selector;
pub mod working_copy;

pub use batch_optimizer::{BatchOptimizer, RunStatus};
pub use confirm::{AutoConfirm, BatchConfirmation, BatchSummary, StdinConfirm};
pub use pipeline::ObjectPipeline;
pub use progress_tracker::ProgressTracker;
pub use selector::{CandidateSelector, Selection};
pub use working_copy::WorkingCopy;
