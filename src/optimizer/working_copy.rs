//! # Working Copy Module
//!
//! File locale effimero che contiene i byte di un candidato durante la pipeline.
//!
//! Ogni working copy vive in una directory temporanea propria, quindi due
//! pipeline concorrenti non collidono mai sul path. La directory viene rimossa
//! da `close()` oppure, in ogni altro caso (errore, panic, task cancellato),
//! dal `Drop` di `TempDir`.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::utils::short_name;

/// Scratch file for one candidate
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    path: PathBuf,
}

impl WorkingCopy {
    /// Reserve a fresh path under `scratch_dir` (system temp dir when `None`).
    ///
    /// The file keeps the object's base name so tools that sniff the
    /// extension see the right one. Nothing is written yet.
    pub fn create(scratch_dir: Option<&Path>, object_name: &str) -> std::io::Result<Self> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("blobopt-");
            builder
        };
        let dir = match scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let file_name = match short_name(object_name) {
            "" | "." | ".." => "object",
            name => name,
        };
        let path = dir.path().join(file_name);
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the working copy now, reporting any cleanup error
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_removes_everything() {
        let scratch = TempDir::new().unwrap();
        let copy = WorkingCopy::create(Some(scratch.path()), "photos/2024/cat.PNG").unwrap();
        assert_eq!(copy.path().file_name().unwrap(), "cat.PNG");
        std::fs::write(copy.path(), b"bytes").unwrap();

        copy.close().unwrap();
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_everything() {
        let scratch = TempDir::new().unwrap();
        {
            let copy = WorkingCopy::create(Some(scratch.path()), "a.jpg").unwrap();
            std::fs::write(copy.path(), b"bytes").unwrap();
        }
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_same_name_never_collides() {
        let scratch = TempDir::new().unwrap();
        let first = WorkingCopy::create(Some(scratch.path()), "a.png").unwrap();
        let second = WorkingCopy::create(Some(scratch.path()), "a.png").unwrap();
        assert_ne!(first.path(), second.path());
    }
}
