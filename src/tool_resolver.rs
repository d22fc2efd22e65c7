//! # Tool Path Resolver
//!
//! This module finds the external optimizer binaries:
//! - `TOOLS_DIR` environment override (bundled tools)
//! - a `tools/` directory next to the executable
//! - system `PATH`

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tools the optimizer knows how to drive, grouped by format
pub const KNOWN_TOOLS: &[(&str, &[&str])] = &[("PNG", &["optipng"]), ("JPEG", &["jpegtran"])];

/// Tool path resolver for bundled and system installs
pub struct ToolPathResolver {
    /// Directory holding bundled tools, if one was found
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a new path resolver
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
        }
    }

    /// Resolver that only searches `tools_dir` and `PATH`
    pub fn with_tools_dir(tools_dir: Option<PathBuf>) -> Self {
        Self { tools_dir }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        // Strategy 1: direct override
        if let Ok(tools_dir) = env::var("TOOLS_DIR") {
            let tools_path = PathBuf::from(tools_dir);
            debug!("Checking TOOLS_DIR environment variable: {:?}", tools_path);
            if tools_path.is_dir() {
                return Some(tools_path);
            }
            warn!("TOOLS_DIR is set but is not a directory: {:?}", tools_path);
        }

        // Strategy 2: tools/ shipped next to the binary
        let exe_path = env::current_exe().ok()?;
        let candidate = exe_path.parent()?.join("tools");
        debug!("Checking bundled tools path: {:?}", candidate);
        if candidate.is_dir() {
            return Some(candidate);
        }

        None
    }

    /// Resolve the path to a specific tool (bundled first, then PATH)
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = Self::bundled_tool_path(tools_dir, tool_name);
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let found = Self::find_in_system_path(tool_name);
        if found.is_none() {
            debug!("Tool not found: {}", tool_name);
        }
        found
    }

    fn bundled_tool_path(tools_dir: &Path, tool_name: &str) -> PathBuf {
        tools_dir.join(format!("{}{}", tool_name, env::consts::EXE_SUFFIX))
    }

    /// Find tool in system PATH
    fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        let tool_with_ext = format!("{}{}", tool_name, env::consts::EXE_SUFFIX);
        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Optimizer tools\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));

        for (category, tool_list) in KNOWN_TOOLS {
            report.push_str(&format!("\n{}:\n", category));
            for tool in tool_list.iter() {
                match self.resolve_tool(tool) {
                    Some(path) => report.push_str(&format!("  [OK] {} -> {:?}\n", tool, path)),
                    None => report.push_str(&format!(
                        "  [MISSING] {} (install with: {})\n",
                        tool,
                        Self::install_instructions(tool)
                    )),
                }
            }
        }

        report
    }

    /// Installation hint for a tool on Debian-like systems
    pub fn install_instructions(tool_name: &str) -> String {
        match tool_name {
            "jpegtran" => "sudo apt-get install libjpeg-turbo-progs".to_string(),
            "optipng" => "sudo apt-get install optipng".to_string(),
            _ => format!("sudo apt-get install {}", tool_name),
        }
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}
