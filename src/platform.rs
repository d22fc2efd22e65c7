//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione dei tool esterni: un'unica istanza
//! condivisa che sa dove si trovano optipng e jpegtran (bundled o di sistema).

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::tool_resolver::ToolPathResolver;

/// Platform-specific command manager with tool resolution
pub struct PlatformCommands {
    tool_resolver: ToolPathResolver,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(|| Self {
            tool_resolver: ToolPathResolver::new(),
        })
    }

    /// Check if a command is available on the system or bundled
    pub fn is_command_available(&self, base_name: &str) -> bool {
        self.tool_resolver.is_tool_available(base_name)
    }

    /// Resolved path to a tool, falling back to the bare name so the OS
    /// lookup (and its error) happens at spawn time
    pub fn tool_path(&self, base_name: &str) -> PathBuf {
        self.tool_resolver
            .resolve_tool(base_name)
            .unwrap_or_else(|| PathBuf::from(base_name))
    }

    /// Get a report of all known tools
    pub fn get_tools_report(&self) -> String {
        self.tool_resolver.get_tools_report()
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
