//! # File Management Module
//!
//! Questo modulo raccoglie le utilità su nomi di oggetti e file locali.
//!
//! ## Responsabilità:
//! - Determinazione formato dall'estensione (case-insensitive)
//! - Matching dei pattern di estensione usati dal selector
//! - Calcolo percentuale di risparmio (troncata verso zero)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **PNG**: `.png`
//! - **JPEG**: `.jpg`, `.jpeg`
//! - Tutto il resto è `Unsupported`
//!
//! ## Esempio:
//! ```rust
//! use blob_image_optimizer::file_manager::{FileManager, ImageKind};
//!
//! assert_eq!(FileManager::kind_of("Photos/IMG_001.JPG"), ImageKind::Jpeg);
//! assert_eq!(FileManager::savings_percent(10_000, 8_000), 20);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Format tag derived from an object name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Unsupported,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless helpers for names, sizes and percentages
pub struct FileManager;

impl FileManager {
    /// Lowercased extension of an object name, if any
    pub fn extension_of(name: &str) -> Option<String> {
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Detect the image kind from the object name
    pub fn kind_of(name: &str) -> ImageKind {
        let Some(ext) = Self::extension_of(name) else {
            return ImageKind::Unsupported;
        };
        match image::ImageFormat::from_extension(&ext) {
            Some(image::ImageFormat::Png) => ImageKind::Png,
            Some(image::ImageFormat::Jpeg) => ImageKind::Jpeg,
            _ => ImageKind::Unsupported,
        }
    }

    /// Check a name against extension patterns like `png`, `.png` or `*.png`
    pub fn matches_extensions(name: &str, patterns: &[String]) -> bool {
        let Some(ext) = Self::extension_of(name) else {
            return false;
        };
        patterns.iter().any(|pattern| {
            let wanted = pattern.trim_start_matches('*').trim_start_matches('.');
            wanted.eq_ignore_ascii_case(&ext)
        })
    }

    /// Size of a local file in bytes
    pub async fn file_size(path: &Path) -> std::io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Savings as an integer percentage, truncated toward zero.
    ///
    /// A zero-byte original yields 0 (nothing to save, nothing lost).
    pub fn savings_percent(original_size: u64, optimized_size: u64) -> i64 {
        if original_size == 0 {
            return 0;
        }
        let delta = original_size as i128 - optimized_size as i128;
        // Integer division in Rust already truncates toward zero
        (delta * 100 / original_size as i128) as i64
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Human-readable signed byte delta (`-2.00 KB`, `+200 B`)
    pub fn format_delta(delta: i64) -> String {
        let sign = if delta < 0 { "-" } else { "+" };
        format!("{}{}", sign, Self::format_size(delta.unsigned_abs()))
    }
}
