//! In-process object store.
//!
//! Objects are kept per container in name order, each with a generation
//! counter that doubles as its version tag. Failure injection hooks let tests
//! break a single object's download or upload.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tokio::fs;

use super::{ContainerRef, ObjectStore, PutCondition, RemoteObject};
use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use crate::marker::Metadata;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    metadata: Metadata,
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    containers: HashMap<ContainerRef, BTreeMap<String, StoredObject>>,
    failing_gets: HashSet<String>,
    failing_puts: HashSet<String>,
    puts: usize,
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-update
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or overwrite an object, bumping its generation
    pub fn insert(&self, container: &ContainerRef, name: &str, data: Vec<u8>, metadata: Metadata) {
        let mut inner = self.lock();
        let objects = inner.containers.entry(container.clone()).or_default();
        let generation = objects.get(name).map(|o| o.generation + 1).unwrap_or(1);
        objects.insert(name.to_string(), StoredObject { data, metadata, generation });
    }

    /// Create an empty container
    pub fn create_container(&self, container: &ContainerRef) {
        self.lock().containers.entry(container.clone()).or_default();
    }

    /// Current bytes and metadata of an object
    pub fn object(&self, container: &ContainerRef, name: &str) -> Option<(Vec<u8>, Metadata)> {
        self.lock()
            .containers
            .get(container)?
            .get(name)
            .map(|o| (o.data.clone(), o.metadata.clone()))
    }

    /// Make every download of `name` fail
    pub fn fail_get(&self, name: &str) {
        self.lock().failing_gets.insert(name.to_string());
    }

    /// Make every upload of `name` fail
    pub fn fail_put(&self, name: &str) {
        self.lock().failing_puts.insert(name.to_string());
    }

    /// Number of successful uploads since creation
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, container: &ContainerRef, patterns: &[String]) -> Result<Vec<RemoteObject>> {
        let inner = self.lock();
        let objects = inner
            .containers
            .get(container)
            .ok_or_else(|| OptimizeError::NotFound(format!("container {}", container)))?;

        Ok(objects
            .iter()
            .filter(|(name, _)| FileManager::matches_extensions(name, patterns))
            .map(|(name, object)| RemoteObject {
                name: name.clone(),
                size: object.data.len() as u64,
                metadata: object.metadata.clone(),
                version: Some(object.generation.to_string()),
            })
            .collect())
    }

    async fn get(&self, container: &ContainerRef, name: &str, dest: &Path) -> Result<()> {
        let data = {
            let inner = self.lock();
            if inner.failing_gets.contains(name) {
                return Err(OptimizeError::Storage(format!("injected download failure for {}", name)));
            }
            inner
                .containers
                .get(container)
                .and_then(|objects| objects.get(name))
                .map(|o| o.data.clone())
                .ok_or_else(|| OptimizeError::NotFound(name.to_string()))?
        };
        fs::write(dest, data).await?;
        Ok(())
    }

    async fn put(
        &self,
        container: &ContainerRef,
        name: &str,
        src: &Path,
        metadata: &Metadata,
        condition: PutCondition,
    ) -> Result<()> {
        if self.lock().failing_puts.contains(name) {
            return Err(OptimizeError::Storage(format!("injected upload failure for {}", name)));
        }

        let data = fs::read(src).await?;

        let mut inner = self.lock();
        let objects = inner
            .containers
            .get_mut(container)
            .ok_or_else(|| OptimizeError::NotFound(format!("container {}", container)))?;

        let current = objects.get(name).map(|o| o.generation);
        if let PutCondition::IfVersionMatches(expected) = &condition {
            if current.map(|g| g.to_string()).as_deref() != Some(expected.as_str()) {
                return Err(OptimizeError::VersionConflict { name: name.to_string() });
            }
        }

        objects.insert(
            name.to_string(),
            StoredObject {
                data,
                metadata: metadata.clone(),
                generation: current.unwrap_or(0) + 1,
            },
        );
        inner.puts += 1;
        Ok(())
    }
}
