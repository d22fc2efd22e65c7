//! # Blob Image Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per-oggetto
//! - `storage`: Astrazione dell'object store (locale su filesystem, in memoria)
//! - `target`: Risoluzione del container su cui lavorare
//! - `marker`: Marker di idempotenza nei metadati degli oggetti
//! - `file_manager`: Estensioni, formati e misure dei file
//! - `image_processor`: Adapter per i tool esterni (optipng, jpegtran)
//! - `optimizer`: Selezione, conferma e pipeline per oggetto
//! - `outcome`: Esito di un singolo oggetto
//! - `progress`: Progress bar e report del batch
//! - `json_output`: Messaggi JSON per uso programmatico
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use blob_image_optimizer::{AdapterRegistry, BatchOptimizer, Config, ContainerRef, LocalObjectStore};
//!
//! let config = Config { container: Some("images".into()), ..Default::default() };
//! let store = Arc::new(LocalObjectStore::new("/srv/blobs"));
//! let registry = AdapterRegistry::from_config(&config);
//! let mut optimizer = BatchOptimizer::new(config, ContainerRef::new("local", "images"), store, registry);
//! let status = optimizer.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod marker;
pub mod optimizer;
pub mod outcome;
pub mod platform;
pub mod progress;
pub mod storage;
pub mod target;
pub mod tool_resolver;
pub mod utils;

pub use config::Config;
pub use error::OptimizeError;
pub use file_manager::{FileManager, ImageKind};
pub use image_processor::{AdapterRegistry, ImageOptimizer, SuccessCheck, ToolRun};
pub use json_output::JsonMessage;
pub use marker::{Metadata, MARKER_KEY, MARKER_VALUE};
pub use optimizer::{AutoConfirm, BatchConfirmation, BatchOptimizer, BatchSummary, ObjectPipeline, RunStatus};
pub use outcome::{OptimizationOutcome, OutcomeAction};
pub use platform::PlatformCommands;
pub use progress::BatchReport;
pub use storage::{ContainerRef, LocalObjectStore, MemoryObjectStore, ObjectStore, PutCondition, RemoteObject};
pub use target::{ConfiguredTarget, TargetResolver};
