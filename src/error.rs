//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare gli errori per-oggetto
//! - Fornisce messaggi di errore descrittivi con il nome dell'oggetto remoto
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Download`: Fetch del blob fallito (oggetto lasciato intatto)
//! - `OptimizerInvocation`: Tool esterno non avviabile o in timeout
//! - `Upload`: Commit fallito (incluso conflitto di versione)
//! - `UnsupportedFormat`: Estensione non gestita (skip informativo, non un errore di batch)
//! - `Storage`: Errori generici del backend (listing, container mancante)
//! - `MissingDependency`: Tool esterno mancante (optipng, jpegtran)
//! - `Validation`: Errori di validazione configurazione
//! - `Worker`: Task di pipeline andato in panic (isolato all'oggetto)
//!
//! Le condizioni di uscita anticipata a livello di run (nessuna immagine,
//! tutte già ottimizzate, utente ha rifiutato) NON sono errori: vedi
//! `optimizer::RunStatus`.
//!
//! ## Esempio:
//! ```rust,ignore
//! store.get(&object, &path).await
//!     .map_err(|e| OptimizeError::Download { name: object.name.clone(), reason: e.to_string() })?;
//! ```

/// Custom error types for image optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed for {name}: {reason}")]
    Download { name: String, reason: String },

    #[error("Could not run optimizer {tool}: {reason}")]
    OptimizerInvocation { tool: String, reason: String },

    #[error("Upload failed for {name}: {reason}")]
    Upload { name: String, reason: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Version conflict on {name}: object changed since it was listed")]
    VersionConflict { name: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl OptimizeError {
    /// Short machine-friendly tag, used in JSON output and the final summary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Download { .. } => "download_failure",
            Self::OptimizerInvocation { .. } => "optimizer_invocation_failure",
            Self::Upload { .. } | Self::VersionConflict { .. } => "upload_failure",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Storage(_) | Self::NotFound(_) => "storage",
            Self::MissingDependency(_) => "missing_dependency",
            Self::Validation(_) => "validation",
            Self::Worker(_) => "worker",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
