//! # Candidate Selector Module
//!
//! Elenca gli oggetti del container con estensione immagine e scarta quelli
//! che portano già il marker. Un risultato vuoto è uno stato terminale
//! normale, non un errore: `Selection` distingue i due casi vuoti.

use tracing::{debug, info};

use crate::error::Result;
use crate::marker::has_marker;
use crate::storage::{ContainerRef, ObjectStore, RemoteObject};

/// Result of candidate discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Objects to optimize, in listing order
    Candidates(Vec<RemoteObject>),
    /// No object matched the extension patterns
    NoCandidateImages,
    /// Every matching object already carries the marker
    AllAlreadyOptimized { total: usize },
}

/// Lists and filters candidates from one container
pub struct CandidateSelector<'a> {
    store: &'a dyn ObjectStore,
    patterns: &'a [String],
}

impl<'a> CandidateSelector<'a> {
    pub fn new(store: &'a dyn ObjectStore, patterns: &'a [String]) -> Self {
        Self { store, patterns }
    }

    /// Every object whose extension matches, marked or not
    pub async fn list(&self, container: &ContainerRef) -> Result<Vec<RemoteObject>> {
        self.store.list(container, self.patterns).await
    }

    /// Drop objects that already carry the marker
    pub fn filter(candidates: Vec<RemoteObject>) -> Vec<RemoteObject> {
        candidates
            .into_iter()
            .filter(|object| {
                let marked = has_marker(&object.metadata);
                if marked {
                    debug!("Skipping already optimized object: {}", object.name);
                }
                !marked
            })
            .collect()
    }

    /// List, filter and classify the result
    pub async fn select(&self, container: &ContainerRef) -> Result<Selection> {
        let listed = self.list(container).await?;
        if listed.is_empty() {
            return Ok(Selection::NoCandidateImages);
        }

        let total = listed.len();
        let candidates = Self::filter(listed);
        info!(
            "Found {} image objects in {}, {} not yet optimized",
            total,
            container,
            candidates.len()
        );

        if candidates.is_empty() {
            Ok(Selection::AllAlreadyOptimized { total })
        } else {
            Ok(Selection::Candidates(candidates))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{with_marker, Metadata};
    use crate::storage::MemoryObjectStore;

    fn patterns() -> Vec<String> {
        vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
    }

    #[tokio::test]
    async fn test_select_excludes_marked_and_other_formats() {
        let store = MemoryObjectStore::new();
        let container = ContainerRef::new("mem", "c");
        store.insert(&container, "a.png", vec![0; 10], with_marker(&Metadata::new()));
        store.insert(&container, "b.JPG", vec![0; 10], Metadata::new());
        store.insert(&container, "c.gif", vec![0; 10], Metadata::new());

        let patterns = patterns();
        let selection = CandidateSelector::new(&store, &patterns).select(&container).await.unwrap();
        match selection {
            Selection::Candidates(objects) => {
                let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
                assert_eq!(names, vec!["b.JPG"]);
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_container_has_no_candidates() {
        let store = MemoryObjectStore::new();
        let container = ContainerRef::new("mem", "c");
        store.create_container(&container);
        store.insert(&container, "notes.txt", vec![0; 10], Metadata::new());

        let patterns = patterns();
        let selection = CandidateSelector::new(&store, &patterns).select(&container).await.unwrap();
        assert_eq!(selection, Selection::NoCandidateImages);
    }

    #[tokio::test]
    async fn test_all_marked_is_distinct_from_empty() {
        let store = MemoryObjectStore::new();
        let container = ContainerRef::new("mem", "c");
        store.insert(&container, "a.png", vec![0; 10], with_marker(&Metadata::new()));

        let patterns = patterns();
        let selection = CandidateSelector::new(&store, &patterns).select(&container).await.unwrap();
        assert_eq!(selection, Selection::AllAlreadyOptimized { total: 1 });
    }
}
