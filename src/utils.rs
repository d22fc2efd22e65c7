//! # Utility Functions Module
//!
//! Small helpers shared by the optimizer adapters.

use std::ffi::OsString;
use std::path::Path;

/// Build a subprocess argument list from flags and a file path.
///
/// Paths are passed through as `OsString` so non-UTF-8 names survive.
///
/// # Example
/// ```rust
/// use blob_image_optimizer::utils::tool_args;
/// use std::path::Path;
///
/// let args = tool_args(["-optimize", "-verbose", "-outfile"], &[Path::new("a.jpg"), Path::new("a.jpg")]);
/// assert_eq!(args.len(), 5);
/// ```
pub fn tool_args<'a, I>(flags: I, paths: &[&Path]) -> Vec<OsString>
where
    I: IntoIterator<Item = &'a str>,
{
    flags
        .into_iter()
        .map(OsString::from)
        .chain(paths.iter().map(|p| p.as_os_str().to_os_string()))
        .collect()
}

/// Captured stdout followed by stderr, lossily decoded.
///
/// Optimizers disagree on which stream carries their report (optipng and
/// jpegtran both write to stderr), so both are searched.
pub fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !text.is_empty() && !stderr.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&String::from_utf8_lossy(stderr));
    text
}

/// Last path segment of an object name, for progress lines
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_args_order() {
        let path = Path::new("/tmp/x.jpg");
        let args = tool_args(["-optimize", "-outfile"], &[path, path]);
        assert_eq!(
            args,
            vec![
                OsString::from("-optimize"),
                OsString::from("-outfile"),
                OsString::from("/tmp/x.jpg"),
                OsString::from("/tmp/x.jpg"),
            ]
        );
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(combined_output(b"out", b"err"), "out\nerr");
        assert_eq!(combined_output(b"", b"err"), "err");
        assert_eq!(combined_output(b"out\n", b""), "out\n");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("a/b/c.png"), "c.png");
        assert_eq!(short_name("c.png"), "c.png");
    }
}
