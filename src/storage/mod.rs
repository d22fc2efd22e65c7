//! # Object Store Boundary
//!
//! The optimizer only consumes a container: list objects, download one to a
//! local path, upload a local file back with its metadata. Everything behind
//! that boundary (auth, retries, transport) belongs to the backend.
//!
//! Two backends ship with the crate:
//! - `LocalObjectStore`: a directory tree, one sub-directory per container
//! - `MemoryObjectStore`: in-process, used by tests and embedders

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::marker::Metadata;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Resolved container reference, threaded through the run unchanged
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    /// Storage account (or root) owning the container
    pub account: String,
    /// Container name
    pub name: String,
}

impl ContainerRef {
    pub fn new(account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.name)
    }
}

/// One object as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub name: String,
    pub size: u64,
    pub metadata: Metadata,
    /// Opaque version tag (ETag / generation), if the backend has one
    pub version: Option<String>,
}

/// Precondition applied to an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// Replace whatever is there (last writer wins)
    Overwrite,
    /// Replace only if the object still carries this version tag
    IfVersionMatches(String),
}

/// Storage collaborator used by the selector and the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose extension matches one of `patterns`, in listing order
    async fn list(&self, container: &ContainerRef, patterns: &[String]) -> Result<Vec<RemoteObject>>;

    /// Download the object's bytes into `dest`
    async fn get(&self, container: &ContainerRef, name: &str, dest: &Path) -> Result<()>;

    /// Replace the object's bytes with the content of `src` and its metadata
    /// with `metadata`, as a single write
    async fn put(
        &self,
        container: &ContainerRef,
        name: &str,
        src: &Path,
        metadata: &Metadata,
        condition: PutCondition,
    ) -> Result<()>;
}
