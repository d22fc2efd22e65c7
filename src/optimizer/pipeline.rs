//! # Object Pipeline Module
//!
//! Worker per l'ottimizzazione di un singolo oggetto remoto.
//!
//! ## Stati:
//! `Fetched → Dispatched → OptimizerRan → Evaluated →
//! {Committed | SkippedNoSavings | SkippedUnsupportedFormat | Failed} → Cleaned`
//!
//! `Cleaned` è raggiunto da ogni ramo: la working copy viene chiusa
//! esplicitamente al termine e, in caso di panic o cancellazione del task,
//! rimossa dal suo `Drop`.
//!
//! ## Regola di commit:
//! il tool deve riportare successo, la percentuale di risparmio (troncata)
//! deve essere `>= 0` e il file non deve essere cresciuto. In ogni altro caso
//! l'oggetto remoto resta intatto.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use crate::image_processor::AdapterRegistry;
use crate::marker::with_marker;
use crate::optimizer::working_copy::WorkingCopy;
use crate::outcome::OptimizationOutcome;
use crate::storage::{ContainerRef, ObjectStore, PutCondition, RemoteObject};

/// Per-object optimizer; cheap to clone into worker tasks
#[derive(Clone)]
pub struct ObjectPipeline {
    store: Arc<dyn ObjectStore>,
    container: ContainerRef,
    registry: AdapterRegistry,
    conditional_commit: bool,
    scratch_dir: Option<PathBuf>,
}

impl ObjectPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, container: ContainerRef, registry: AdapterRegistry) -> Self {
        Self {
            store,
            container,
            registry,
            conditional_commit: false,
            scratch_dir: None,
        }
    }

    /// Only commit when the object still has the version seen at listing time
    pub fn with_conditional_commit(mut self, enabled: bool) -> Self {
        self.conditional_commit = enabled;
        self
    }

    /// Place working copies under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Run the whole pipeline for one object. Never fails: errors become a
    /// `Failed` outcome and the remote object is left as it was.
    pub async fn process(&self, object: &RemoteObject) -> OptimizationOutcome {
        let working_copy = match WorkingCopy::create(self.scratch_dir.as_deref(), &object.name) {
            Ok(copy) => copy,
            Err(e) => {
                let err = OptimizeError::Io(e);
                error!("Cannot create working copy for {}: {}", object.name, err);
                return OptimizationOutcome::failed(&object.name, object.size, &err);
            }
        };

        let result = self.run_stages(object, &working_copy).await;

        if let Err(e) = working_copy.close() {
            warn!("Failed to clean up working copy for {}: {}", object.name, e);
        }

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to optimize {}: {}", object.name, e);
                OptimizationOutcome::failed(&object.name, object.size, &e)
            }
        }
    }

    async fn run_stages(&self, object: &RemoteObject, working_copy: &WorkingCopy) -> Result<OptimizationOutcome> {
        let name = object.name.as_str();
        let local = working_copy.path();

        // Fetched
        self.store
            .get(&self.container, name, local)
            .await
            .map_err(|e| OptimizeError::Download {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let original_size = FileManager::file_size(local).await.map_err(|e| OptimizeError::Download {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Fetched {} ({} bytes) to {}", name, original_size, local.display());

        // Dispatched
        let kind = FileManager::kind_of(name);
        let Some(adapter) = self.registry.get(kind) else {
            debug!("{} ({}), leaving it untouched", OptimizeError::UnsupportedFormat(name.to_string()), kind);
            return Ok(OptimizationOutcome::unsupported(name, original_size));
        };

        // OptimizerRan
        let run = adapter.optimize(local).await?;
        let optimized_size = FileManager::file_size(local).await?;
        debug!(
            "{} on {}: succeeded={} size {} -> {}",
            adapter.tool_name(),
            name,
            run.succeeded,
            original_size,
            optimized_size
        );
        if !run.succeeded {
            debug!("{} output for {}:\n{}", adapter.tool_name(), name, run.output.trim_end());
        }

        // Evaluated
        if !Self::should_commit(run.succeeded, original_size, optimized_size) {
            return Ok(OptimizationOutcome::skipped_no_savings(name, original_size, optimized_size));
        }

        // Committed
        let metadata = with_marker(&object.metadata);
        let condition = match (&object.version, self.conditional_commit) {
            (Some(version), true) => PutCondition::IfVersionMatches(version.clone()),
            _ => PutCondition::Overwrite,
        };
        self.store
            .put(&self.container, name, local, &metadata, condition)
            .await
            .map_err(|e| match e {
                OptimizeError::VersionConflict { .. } => e,
                other => OptimizeError::Upload {
                    name: name.to_string(),
                    reason: other.to_string(),
                },
            })?;

        Ok(OptimizationOutcome::committed(name, original_size, optimized_size))
    }

    /// Commit only a successful run that did not grow the file
    pub fn should_commit(succeeded: bool, original_size: u64, optimized_size: u64) -> bool {
        succeeded
            && FileManager::savings_percent(original_size, optimized_size) >= 0
            && optimized_size <= original_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_manager::ImageKind;
    use crate::image_processor::{ImageOptimizer, ToolRun};
    use crate::marker::{Metadata, MARKER_KEY};
    use crate::outcome::OutcomeAction;
    use crate::storage::MemoryObjectStore;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Rewrites the file to `size` bytes and reports `succeeded`
    struct Shrink {
        kind: ImageKind,
        size: usize,
        succeeded: bool,
    }

    #[async_trait]
    impl ImageOptimizer for Shrink {
        fn kind(&self) -> ImageKind {
            self.kind
        }

        fn tool_name(&self) -> &str {
            "shrink"
        }

        async fn optimize(&self, path: &Path) -> Result<ToolRun> {
            tokio::fs::write(path, vec![0u8; self.size]).await?;
            Ok(ToolRun {
                succeeded: self.succeeded,
                output: String::new(),
            })
        }
    }

    fn setup(size: usize, succeeded: bool) -> (Arc<MemoryObjectStore>, ObjectPipeline, ContainerRef) {
        let store = Arc::new(MemoryObjectStore::new());
        let container = ContainerRef::new("mem", "c");
        let mut metadata = Metadata::new();
        metadata.insert("owner".to_string(), "web".to_string());
        store.insert(&container, "a.png", vec![1u8; 100], metadata);

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Shrink { kind: ImageKind::Png, size, succeeded }));
        let pipeline = ObjectPipeline::new(store.clone(), container.clone(), registry);
        (store, pipeline, container)
    }

    async fn listed(store: &MemoryObjectStore, container: &ContainerRef) -> RemoteObject {
        store
            .list(container, &["png".to_string(), "gif".to_string()])
            .await
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_commit_rule() {
        assert!(ObjectPipeline::should_commit(true, 100, 80));
        assert!(ObjectPipeline::should_commit(true, 100, 100));
        assert!(!ObjectPipeline::should_commit(true, 100, 101));
        // growth below 1% truncates to 0% but still must not be committed
        assert_eq!(FileManager::savings_percent(1_000, 1_005), 0);
        assert!(!ObjectPipeline::should_commit(true, 1_000, 1_005));
        assert!(!ObjectPipeline::should_commit(false, 100, 50));
    }

    #[tokio::test]
    async fn test_commit_preserves_metadata_and_marks() {
        let (store, pipeline, container) = setup(60, true);
        let object = listed(&store, &container).await;

        let outcome = pipeline.process(&object).await;
        assert_eq!(outcome.action, OutcomeAction::Committed);
        assert_eq!(outcome.savings_percent, 40);

        let (data, metadata) = store.object(&container, "a.png").unwrap();
        assert_eq!(data.len(), 60);
        assert_eq!(metadata.get("owner").map(String::as_str), Some("web"));
        assert_eq!(metadata.get(MARKER_KEY).map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_tool_failure_skips_without_writing() {
        let (store, pipeline, container) = setup(10, false);
        let object = listed(&store, &container).await;

        let outcome = pipeline.process(&object).await;
        assert_eq!(outcome.action, OutcomeAction::SkippedNoSavings);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_never_reaches_adapter() {
        let (store, pipeline, container) = setup(10, true);
        store.insert(&container, "a.gif", vec![1u8; 50], Metadata::new());
        let object = store
            .list(&container, &["gif".to_string()])
            .await
            .unwrap()
            .remove(0);

        let outcome = pipeline.process(&object).await;
        assert_eq!(outcome.action, OutcomeAction::SkippedUnsupportedFormat);
        assert_eq!(store.object(&container, "a.gif").unwrap().0.len(), 50);
    }

    #[tokio::test]
    async fn test_upload_failure_is_isolated_and_cleaned() {
        let scratch = TempDir::new().unwrap();
        let (store, pipeline, container) = setup(10, true);
        let pipeline = pipeline.with_scratch_dir(Some(scratch.path().to_path_buf()));
        store.fail_put("a.png");
        let object = listed(&store, &container).await;

        let outcome = pipeline.process(&object).await;
        assert_eq!(outcome.action, OutcomeAction::Failed);
        assert!(outcome.error.unwrap().starts_with("upload_failure"));
        assert_eq!(store.object(&container, "a.png").unwrap().0.len(), 100);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_conditional_commit_refuses_changed_object() {
        let (store, pipeline, container) = setup(10, true);
        let pipeline = pipeline.with_conditional_commit(true);
        let object = listed(&store, &container).await;

        // concurrent external write after listing
        store.insert(&container, "a.png", vec![2u8; 100], Metadata::new());

        let outcome = pipeline.process(&object).await;
        assert_eq!(outcome.action, OutcomeAction::Failed);
        let (data, metadata) = store.object(&container, "a.png").unwrap();
        assert_eq!(data, vec![2u8; 100]);
        assert!(!metadata.contains_key(MARKER_KEY));
    }
}
