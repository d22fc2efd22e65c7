//! Directory-backed object store.
//!
//! Layout under the store root:
//! ```text
//! <root>/<container>/photos/cat.png              object bytes
//! <root>/<container>/.blobmeta/photos/cat.png.json  object metadata
//! ```
//! Object names are paths relative to the container directory, always with
//! `/` separators. The version tag is the SHA-256 of the content; it is only
//! computed when content versions are enabled, and only for unmarked objects.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ContainerRef, ObjectStore, PutCondition, RemoteObject};
use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use crate::marker::{has_marker, Metadata};

const META_DIR: &str = ".blobmeta";

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    content_versions: bool,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            content_versions: false,
        }
    }

    /// Report a SHA-256 version for each unmarked object when listing.
    ///
    /// Needed for conditional commits; off by default since it reads every
    /// candidate in full.
    pub fn with_content_versions(mut self, enabled: bool) -> Self {
        self.content_versions = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &ContainerRef) -> PathBuf {
        self.root.join(&container.name)
    }

    fn object_path(&self, container: &ContainerRef, name: &str) -> PathBuf {
        let mut path = self.container_dir(container);
        path.extend(name.split('/'));
        path
    }

    fn metadata_path(&self, container: &ContainerRef, name: &str) -> PathBuf {
        let mut path = self.container_dir(container).join(META_DIR);
        path.extend(name.split('/'));
        path.with_file_name(format!(
            "{}.json",
            path.file_name().unwrap_or_default().to_string_lossy()
        ))
    }

    /// Hidden sibling used while staging a replace
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        path.with_file_name(format!(
            ".{}.{}",
            path.file_name().unwrap_or_default().to_string_lossy(),
            suffix
        ))
    }

    async fn read_metadata(&self, container: &ContainerRef, name: &str) -> Result<Metadata> {
        let path = self.metadata_path(container, name);
        if !path.exists() {
            return Ok(Metadata::new());
        }
        let content = fs::read_to_string(&path).await?;
        serde_json::from_str(&content)
            .map_err(|e| OptimizeError::Storage(format!("corrupt metadata for {}: {}", name, e)))
    }

    async fn write_metadata(&self, container: &ContainerRef, name: &str, metadata: &Metadata) -> Result<()> {
        let path = self.metadata_path(container, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| OptimizeError::Storage(e.to_string()))?;
        let staging = Self::sibling(&path, "tmp");
        fs::write(&staging, content).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn version_of(path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Seed an object directly on disk
    pub async fn insert(&self, container: &ContainerRef, name: &str, data: &[u8], metadata: &Metadata) -> Result<()> {
        let path = self.object_path(container, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        if !metadata.is_empty() {
            self.write_metadata(container, name, metadata).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, container: &ContainerRef, patterns: &[String]) -> Result<Vec<RemoteObject>> {
        let dir = self.container_dir(container);
        if !dir.is_dir() {
            return Err(OptimizeError::NotFound(format!("container {}", container)));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|e| e.file_name() != META_DIR)
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry in {}: {}", container, err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(&dir)
                .map_err(|e| OptimizeError::Storage(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if FileManager::matches_extensions(&name, patterns) {
                names.push(name);
            }
        }
        names.sort();

        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            let path = self.object_path(container, &name);
            let size = FileManager::file_size(&path).await?;
            let metadata = self.read_metadata(container, &name).await?;
            let version = if self.content_versions && !has_marker(&metadata) {
                Some(Self::version_of(&path).await?)
            } else {
                None
            };
            objects.push(RemoteObject { name, size, metadata, version });
        }

        debug!("Listed {} matching objects in {}", objects.len(), container);
        Ok(objects)
    }

    async fn get(&self, container: &ContainerRef, name: &str, dest: &Path) -> Result<()> {
        let path = self.object_path(container, name);
        if !path.is_file() {
            return Err(OptimizeError::NotFound(name.to_string()));
        }
        fs::copy(&path, dest).await?;
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
        let dest = self.object_path(container, name);

        if let PutCondition::IfVersionMatches(expected) = &condition {
            let current = if dest.exists() {
                Some(Self::version_of(&dest).await?)
            } else {
                None
            };
            if current.as_deref() != Some(expected.as_str()) {
                return Err(OptimizeError::VersionConflict { name: name.to_string() });
            }
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Stage next to the destination so the final rename stays on one filesystem
        let staging = Self::sibling(&dest, "upload");
        fs::copy(src, &staging).await?;

        let backup = if dest.exists() {
            let backup = Self::sibling(&dest, "backup");
            fs::copy(&dest, &backup).await?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, &dest).await {
            let _ = fs::remove_file(&staging).await;
            if let Some(backup) = backup {
                let _ = fs::remove_file(&backup).await;
            }
            return Err(e.into());
        }

        match self.write_metadata(container, name, metadata).await {
            Ok(()) => {
                if let Some(backup) = backup {
                    let _ = fs::remove_file(&backup).await;
                }
                Ok(())
            }
            Err(e) => {
                // Content and metadata move together: put the old bytes back
                match backup {
                    Some(backup) => {
                        if let Err(restore) = fs::rename(&backup, &dest).await {
                            warn!("Failed to restore {} after metadata error: {}", name, restore);
                        }
                    }
                    None => {
                        let _ = fs::remove_file(&dest).await;
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{with_marker, MARKER_KEY};
    use tempfile::TempDir;

    fn patterns() -> Vec<String> {
        vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
    }

    #[tokio::test]
    async fn test_list_filters_extensions_and_skips_metadata_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());
        let container = ContainerRef::new("local", "images");

        let mut metadata = Metadata::new();
        metadata.insert("owner".to_string(), "web".to_string());
        store.insert(&container, "b/photo.PNG", b"png-bytes", &metadata).await.unwrap();
        store.insert(&container, "a.jpg", b"jpg", &Metadata::new()).await.unwrap();
        store.insert(&container, "anim.gif", b"gif", &Metadata::new()).await.unwrap();

        let objects = store.list(&container, &patterns()).await.unwrap();
        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b/photo.PNG"]);
        assert_eq!(objects[1].size, 9);
        assert_eq!(objects[1].metadata.get("owner").map(String::as_str), Some("web"));
        assert!(objects[0].version.is_none());
    }

    #[tokio::test]
    async fn test_versions_only_for_unmarked_objects_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path()).with_content_versions(true);
        let container = ContainerRef::new("local", "images");
        store.insert(&container, "done.png", b"done", &with_marker(&Metadata::new())).await.unwrap();
        store.insert(&container, "todo.png", b"todo", &Metadata::new()).await.unwrap();

        let objects = store.list(&container, &patterns()).await.unwrap();
        assert_eq!(objects[0].name, "done.png");
        assert!(objects[0].version.is_none());
        assert_eq!(
            objects[1].version.as_deref(),
            Some(hex::encode(Sha256::digest(b"todo")).as_str())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_directory_does_not_hide_other_objects() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());
        let container = ContainerRef::new("local", "images");
        store.insert(&container, "a.png", b"a", &Metadata::new()).await.unwrap();
        store.insert(&container, "locked/b.png", b"b", &Metadata::new()).await.unwrap();

        let locked = temp_dir.path().join("images").join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let privileged = std::fs::read_dir(&locked).is_ok();

        let result = store.list(&container, &patterns()).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let names: Vec<String> = result.unwrap().into_iter().map(|o| o.name).collect();
        if privileged {
            // permission bits are not enforced for this user
            assert_eq!(names, vec!["a.png", "locked/b.png"]);
        } else {
            assert_eq!(names, vec!["a.png"]);
        }
    }

    #[tokio::test]
    async fn test_missing_container_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());
        let result = store.list(&ContainerRef::new("local", "nope"), &patterns()).await;
        assert!(matches!(result, Err(OptimizeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_replaces_content_and_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("root"));
        let container = ContainerRef::new("local", "images");
        store.insert(&container, "x.png", b"0123456789", &Metadata::new()).await.unwrap();

        let src = temp_dir.path().join("optimized.png");
        fs::write(&src, b"01234").await.unwrap();
        store
            .put(&container, "x.png", &src, &with_marker(&Metadata::new()), PutCondition::Overwrite)
            .await
            .unwrap();

        let objects = store.list(&container, &patterns()).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].size, 5);
        assert!(objects[0].metadata.contains_key(MARKER_KEY));

        // no staging or backup leftovers
        let leftovers: Vec<_> = std::fs::read_dir(store.root().join("images"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".upload") || n.ends_with(".backup"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_conditional_put_detects_change() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("root")).with_content_versions(true);
        let container = ContainerRef::new("local", "images");
        store.insert(&container, "x.png", b"original", &Metadata::new()).await.unwrap();
        let listed = store.list(&container, &patterns()).await.unwrap().remove(0);

        // someone else rewrites the object after listing
        store.insert(&container, "x.png", b"changed!", &Metadata::new()).await.unwrap();

        let src = temp_dir.path().join("new.png");
        fs::write(&src, b"tiny").await.unwrap();
        let result = store
            .put(
                &container,
                "x.png",
                &src,
                &Metadata::new(),
                PutCondition::IfVersionMatches(listed.version.unwrap()),
            )
            .await;
        assert!(matches!(result, Err(OptimizeError::VersionConflict { .. })));

        let dest = temp_dir.path().join("check.png");
        store.get(&container, "x.png", &dest).await.unwrap();
        assert_eq!(fs::read(&dest).await.unwrap(), b"changed!");
    }
}
