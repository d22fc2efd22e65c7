//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione di un run.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del batch
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `store_root`: Radice dello store locale (un container = una sotto-directory)
//! - `account`: Nome account mostrato nei log e nei messaggi JSON
//! - `container`: Container da ottimizzare (obbligatorio prima del run)
//! - `extensions`: Estensioni candidate (default: png, jpg, jpeg)
//! - `confirm_batch`: Chiede conferma una volta sola prima di modificare (default: true)
//! - `workers`: Pipeline concorrenti (default: 1 = sequenziale)
//! - `tool_timeout_secs`: Timeout per ogni invocazione di tool (default: 300)
//! - `png_tool` / `jpeg_tool`: Nome dei tool esterni (default: optipng / jpegtran)
//! - `success_check`: Criterio di successo dei tool (default: output pattern)
//! - `conditional_commit`: Commit solo se l'oggetto non è cambiato (default: false)
//! - `scratch_dir`: Directory per le working copy (default: temp di sistema)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Esempio:
//! ```rust
//! use blob_image_optimizer::Config;
//!
//! let config = Config {
//!     container: Some("images".to_string()),
//!     workers: 4,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::image_processor::SuccessCheck;

/// Configuration for one optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of the local object store
    pub store_root: PathBuf,
    /// Account name (informational for the local store)
    pub account: String,
    /// Container to process
    pub container: Option<String>,
    /// Candidate extensions, matched case-insensitively
    pub extensions: Vec<String>,
    /// Ask once for confirmation before the first mutation
    pub confirm_batch: bool,
    /// Number of concurrent pipelines
    pub workers: usize,
    /// Upper bound for a single optimizer invocation
    pub tool_timeout_secs: u64,
    /// PNG optimizer executable name
    pub png_tool: String,
    /// JPEG optimizer executable name
    pub jpeg_tool: String,
    /// How a tool run is judged successful
    pub success_check: SuccessCheck,
    /// Refuse to commit over an object that changed since listing
    pub conditional_commit: bool,
    /// Parent directory for working copies (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("."),
            account: "local".to_string(),
            container: None,
            extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            confirm_batch: true,
            workers: 1,
            tool_timeout_secs: 300,
            png_tool: "optipng".to_string(),
            jpeg_tool: "jpegtran".to_string(),
            success_check: SuccessCheck::OutputPattern,
            conditional_commit: false,
            scratch_dir: None,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.tool_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Tool timeout must be greater than 0 seconds"));
        }

        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(anyhow::anyhow!("At least one candidate extension is required"));
        }

        if let Some(ref container) = self.container {
            if container.trim().is_empty() || container.contains(['/', '\\']) {
                return Err(anyhow::anyhow!("Invalid container name: {:?}", container));
            }
        }

        if self.png_tool.is_empty() || self.jpeg_tool.is_empty() {
            return Err(anyhow::anyhow!("Optimizer tool names must not be empty"));
        }

        Ok(())
    }

    /// Default location of the config file (`~/.config/blob-optimizer/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blob-optimizer").join("config.json"))
    }

    /// Load configuration from file, falling back to defaults when absent
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 2;
        config.tool_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.tool_timeout_secs = 60;
        config.container = Some("a/b".to_string());
        assert!(config.validate().is_err());

        config.container = Some("images".to_string());
        config.extensions = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.workers, 1);
        assert!(config.confirm_batch);
        assert!(!config.conditional_commit);
        assert_eq!(config.png_tool, "optipng");
        assert_eq!(config.jpeg_tool, "jpegtran");
        assert_eq!(config.success_check, SuccessCheck::OutputPattern);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            container: Some("images".to_string()),
            workers: 4,
            confirm_batch: false,
            success_check: SuccessCheck::ExitStatus,
            conditional_commit: true,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(loaded_config, original_config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{ "container": "assets", "workers": 3 }"#)
            .await
            .unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.container.as_deref(), Some("assets"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.extensions.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, Config::default());
    }
}
