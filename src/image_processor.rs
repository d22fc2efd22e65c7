//! # Image Processing Module
//!
//! Questo modulo incapsula i tool esterni di ottimizzazione lossless. Nessuna
//! elaborazione in memoria: ogni formato è delegato a un eseguibile dedicato
//! che modifica il file in place.
//!
//! ## Formati Supportati
//!
//! | Formato | Tool       | Invocazione                                         | Segnale di successo |
//! |---------|------------|-----------------------------------------------------|---------------------|
//! | PNG     | optipng    | `optipng <path>`                                    | `Input file size` o `already optimized` |
//! | JPEG    | jpegtran   | `jpegtran -optimize -verbose -copy all -outfile <path> <path>` | `End of Image` |
//!
//! ## Contratto
//!
//! `optimize(path) -> ToolRun { succeeded, output }`:
//! - un tool che gira ma non ottimizza è `succeeded = false`, NON un errore
//! - un tool che non si avvia (binario mancante, permessi, timeout) è
//!   `OptimizeError::OptimizerInvocation`
//!
//! ## Criterio di successo
//!
//! - `SuccessCheck::OutputPattern` (default): cerca le frasi note nell'output
//!   combinato stdout+stderr
//! - `SuccessCheck::ExitStatus`: usa solo l'exit code; la decisione finale
//!   resta il confronto delle dimensioni nella pipeline
//!
//! ## Esempio
//!
//! ```rust,ignore
//! let registry = AdapterRegistry::from_config(&config);
//! if let Some(adapter) = registry.get(ImageKind::Png) {
//!     let run = adapter.optimize(&working_copy).await?;
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{OptimizeError, Result};
use crate::file_manager::ImageKind;
use crate::platform::PlatformCommands;
use crate::utils::{combined_output, tool_args};

/// Phrases optipng prints when it either shrank the file or found it optimal
pub const PNG_SUCCESS_PATTERNS: &[&str] = &["Input file size", "already optimized"];
/// Trace line jpegtran prints in verbose mode once the whole image was read
pub const JPEG_SUCCESS_PATTERNS: &[&str] = &["End of Image"];

/// How an adapter decides whether its tool run succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessCheck {
    /// Look for the tool's known report phrases in its output
    #[default]
    OutputPattern,
    /// Trust the process exit status
    ExitStatus,
}

impl SuccessCheck {
    fn evaluate(&self, exit_success: bool, output: &str, patterns: &[&str]) -> bool {
        match self {
            Self::OutputPattern => patterns.iter().any(|p| output.contains(p)),
            Self::ExitStatus => exit_success,
        }
    }
}

/// Result of one optimizer invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub succeeded: bool,
    pub output: String,
}

/// One format-specific optimizer
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    /// Format this adapter handles
    fn kind(&self) -> ImageKind;

    /// Name used in logs and dependency checks
    fn tool_name(&self) -> &str;

    /// Whether the backing tool can be launched at all
    fn is_available(&self) -> bool {
        true
    }

    /// Optimize the file at `path` in place
    async fn optimize(&self, path: &Path) -> Result<ToolRun>;
}

/// Spawn `program`, capture stdout+stderr, and give up after `timeout`.
///
/// Returns the exit status flag and the combined output.
pub async fn run_captured(program: &Path, args: &[OsString], timeout: Duration) -> Result<(bool, String)> {
    let tool = program.display().to_string();
    debug!("Running {} {:?}", tool, args);

    let start_time = std::time::Instant::now();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| OptimizeError::OptimizerInvocation {
            tool: tool.clone(),
            reason: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| OptimizeError::OptimizerInvocation {
            tool: tool.clone(),
            reason: e.to_string(),
        })?,
        Err(_) => {
            // Dropping the future drops the child, which kills it
            warn!("{} timed out after {:?}", tool, timeout);
            return Err(OptimizeError::OptimizerInvocation {
                tool,
                reason: format!("timed out after {:?}", timeout),
            });
        }
    };

    debug!("{} exited with {} in {:?}", tool, output.status, start_time.elapsed());
    Ok((
        output.status.success(),
        combined_output(&output.stdout, &output.stderr),
    ))
}

/// Settings shared by every subprocess-backed adapter
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub name: String,
    pub program: PathBuf,
    pub timeout: Duration,
    pub success_check: SuccessCheck,
}

impl ToolSettings {
    /// Resolve `name` through the platform tool lookup
    pub fn resolve(name: &str, timeout: Duration, success_check: SuccessCheck) -> Self {
        Self {
            name: name.to_string(),
            program: PlatformCommands::instance().tool_path(name),
            timeout,
            success_check,
        }
    }
}

/// Lossless PNG optimizer (optipng-compatible)
pub struct PngOptimizer {
    settings: ToolSettings,
}

impl PngOptimizer {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ImageOptimizer for PngOptimizer {
    fn kind(&self) -> ImageKind {
        ImageKind::Png
    }

    fn tool_name(&self) -> &str {
        &self.settings.name
    }

    fn is_available(&self) -> bool {
        self.settings.program.is_file() || PlatformCommands::instance().is_command_available(&self.settings.name)
    }

    async fn optimize(&self, path: &Path) -> Result<ToolRun> {
        let no_flags: [&str; 0] = [];
        let args = tool_args(no_flags, &[path]);
        let (exit_success, output) = run_captured(&self.settings.program, &args, self.settings.timeout).await?;
        let succeeded = self
            .settings
            .success_check
            .evaluate(exit_success, &output, PNG_SUCCESS_PATTERNS);
        Ok(ToolRun { succeeded, output })
    }
}

/// Lossless JPEG transform (jpegtran-compatible), rewriting the file in place.
///
/// `-copy all` keeps EXIF, ICC and every other marker segment.
pub struct JpegOptimizer {
    settings: ToolSettings,
}

impl JpegOptimizer {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ImageOptimizer for JpegOptimizer {
    fn kind(&self) -> ImageKind {
        ImageKind::Jpeg
    }

    fn tool_name(&self) -> &str {
        &self.settings.name
    }

    fn is_available(&self) -> bool {
        self.settings.program.is_file() || PlatformCommands::instance().is_command_available(&self.settings.name)
    }

    async fn optimize(&self, path: &Path) -> Result<ToolRun> {
        let args = tool_args(["-optimize", "-verbose", "-copy", "all", "-outfile"], &[path, path]);
        let (exit_success, output) = run_captured(&self.settings.program, &args, self.settings.timeout).await?;
        let succeeded = self
            .settings
            .success_check
            .evaluate(exit_success, &output, JPEG_SUCCESS_PATTERNS);
        Ok(ToolRun { succeeded, output })
    }
}

/// Adapters keyed by the format they handle
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ImageKind, Arc<dyn ImageOptimizer>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default PNG + JPEG adapters configured from `config`
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.tool_timeout_secs);
        let mut registry = Self::new();
        registry.register(Arc::new(PngOptimizer::new(ToolSettings::resolve(
            &config.png_tool,
            timeout,
            config.success_check,
        ))));
        registry.register(Arc::new(JpegOptimizer::new(ToolSettings::resolve(
            &config.jpeg_tool,
            timeout,
            config.success_check,
        ))));
        registry
    }

    /// Add or replace the adapter for its format
    pub fn register(&mut self, adapter: Arc<dyn ImageOptimizer>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: ImageKind) -> Option<Arc<dyn ImageOptimizer>> {
        self.adapters.get(&kind).cloned()
    }

    /// Fail when a registered tool cannot be found
    pub fn check_dependencies(&self) -> Result<()> {
        let mut missing: Vec<&str> = self
            .adapters
            .values()
            .filter(|adapter| !adapter.is_available())
            .map(|adapter| adapter.tool_name())
            .collect();
        missing.sort_unstable();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OptimizeError::MissingDependency(missing.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_pattern_check() {
        let check = SuccessCheck::OutputPattern;
        assert!(check.evaluate(false, "** Processing: x.png\nInput file size = 10000 bytes", PNG_SUCCESS_PATTERNS));
        assert!(check.evaluate(true, "x.png is already optimized.", PNG_SUCCESS_PATTERNS));
        assert!(!check.evaluate(true, "Error: Not a PNG file", PNG_SUCCESS_PATTERNS));
        assert!(check.evaluate(true, "End of Image", JPEG_SUCCESS_PATTERNS));
    }

    #[test]
    fn test_exit_status_check_ignores_text() {
        let check = SuccessCheck::ExitStatus;
        assert!(check.evaluate(true, "", PNG_SUCCESS_PATTERNS));
        assert!(!check.evaluate(false, "Input file size", PNG_SUCCESS_PATTERNS));
    }

    #[tokio::test]
    async fn test_missing_binary_is_invocation_failure() {
        let settings = ToolSettings {
            name: "optipng".to_string(),
            program: PathBuf::from("/nonexistent/bin/optipng-missing"),
            timeout: Duration::from_secs(5),
            success_check: SuccessCheck::OutputPattern,
        };
        let adapter = PngOptimizer::new(settings);
        let result = adapter.optimize(Path::new("/tmp/whatever.png")).await;
        assert!(matches!(result, Err(OptimizeError::OptimizerInvocation { .. })));
    }

    #[test]
    fn test_registry_dispatch_by_kind() {
        let registry = AdapterRegistry::from_config(&Config::default());
        assert_eq!(registry.get(ImageKind::Png).map(|a| a.kind()), Some(ImageKind::Png));
        assert_eq!(registry.get(ImageKind::Jpeg).map(|a| a.kind()), Some(ImageKind::Jpeg));
        assert!(registry.get(ImageKind::Unsupported).is_none());
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn settings(program: PathBuf, timeout: Duration) -> ToolSettings {
            ToolSettings {
                name: "fake".to_string(),
                program,
                timeout,
                success_check: SuccessCheck::OutputPattern,
            }
        }

        #[tokio::test]
        async fn test_png_adapter_reads_stderr_report() {
            let temp_dir = TempDir::new().unwrap();
            let tool = script(
                temp_dir.path(),
                "optipng",
                "echo 'Input file size = 10 bytes' >&2\nprintf 'abc' > \"$1\"",
            );
            let image = temp_dir.path().join("a.png");
            std::fs::write(&image, b"0123456789").unwrap();

            let run = PngOptimizer::new(settings(tool, Duration::from_secs(10)))
                .optimize(&image)
                .await
                .unwrap();
            assert!(run.succeeded);
            assert_eq!(std::fs::read(&image).unwrap(), b"abc");
        }

        #[tokio::test]
        async fn test_jpeg_adapter_passes_in_place_paths() {
            let temp_dir = TempDir::new().unwrap();
            // succeed only when all markers are kept and -outfile targets the source
            let tool = script(
                temp_dir.path(),
                "jpegtran",
                "[ \"$3 $4\" = \"-copy all\" ] && [ \"$5\" = \"-outfile\" ] && [ \"$6\" = \"$7\" ] && echo 'End of Image' >&2",
            );
            let image = temp_dir.path().join("a.jpg");
            std::fs::write(&image, b"jpeg").unwrap();

            let run = JpegOptimizer::new(settings(tool, Duration::from_secs(10)))
                .optimize(&image)
                .await
                .unwrap();
            assert!(run.succeeded);
        }

        #[tokio::test]
        async fn test_tool_failure_is_not_an_error() {
            let temp_dir = TempDir::new().unwrap();
            let tool = script(temp_dir.path(), "optipng", "echo 'Error: bad file' >&2\nexit 1");
            let image = temp_dir.path().join("a.png");
            std::fs::write(&image, b"x").unwrap();

            let run = PngOptimizer::new(settings(tool, Duration::from_secs(10)))
                .optimize(&image)
                .await
                .unwrap();
            assert!(!run.succeeded);
            assert!(run.output.contains("bad file"));
        }

        #[tokio::test]
        async fn test_hung_tool_times_out() {
            let temp_dir = TempDir::new().unwrap();
            let tool = script(temp_dir.path(), "optipng", "sleep 30");
            let image = temp_dir.path().join("a.png");
            std::fs::write(&image, b"x").unwrap();

            let result = PngOptimizer::new(settings(tool, Duration::from_millis(200)))
                .optimize(&image)
                .await;
            assert!(matches!(result, Err(OptimizeError::OptimizerInvocation { .. })));
        }
    }
}
