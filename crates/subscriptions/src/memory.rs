//! An in-process [`ResourceCollection`] backed by a map.
//!
//! Used by tests across the workspace. Every successful write bumps a
//! per-resource version counter so the optimistic precondition behaves like
//! the Kubernetes API server's.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{
    AnnotationMap, AnnotationPatch, CollectionError, ManagedResource, Namespace, ResourceCollection,
    ResourceKind, ResourceName, ResourceVersion,
};

#[derive(Debug)]
struct StoredResource {
    namespace: Option<Namespace>,
    version: u64,
    annotations: AnnotationMap,
    concurrent_writes: VecDeque<AnnotationMap>,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<ResourceName, StoredResource>,
    patches: usize,
}

/// Map-backed collection with resource-version preconditions.
#[derive(Debug)]
pub struct InMemoryCollection {
    kind: ResourceKind,
    state: Mutex<State>,
}

impl InMemoryCollection {
    /// Creates an empty collection of the given kind.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a resource. Empty names are ignored.
    pub fn insert(&self, namespace: &str, name: &str, annotations: AnnotationMap) {
        let Some(name) = ResourceName::new(name) else {
            return;
        };
        self.state().resources.insert(
            name,
            StoredResource {
                namespace: Namespace::new(namespace),
                version: 1,
                annotations,
                concurrent_writes: VecDeque::new(),
            },
        );
    }

    /// Current annotations of `name`, if it exists.
    pub fn annotations(&self, name: &str) -> Option<AnnotationMap> {
        let name = ResourceName::new(name)?;
        self.state()
            .resources
            .get(&name)
            .map(|r| r.annotations.clone())
    }

    /// Number of patches that were accepted.
    pub fn patch_count(&self) -> usize {
        self.state().patches
    }

    /// Simulates another writer: right before the next patch of `name` is
    /// checked, `changes` are merged into its annotations and its version moves.
    pub fn queue_concurrent_write(&self, name: &str, changes: AnnotationMap) {
        let Some(name) = ResourceName::new(name) else {
            return;
        };
        if let Some(resource) = self.state().resources.get_mut(&name) {
            resource.concurrent_writes.push_back(changes);
        }
    }

    fn snapshot(&self, name: &ResourceName, resource: &StoredResource) -> ManagedResource {
        ManagedResource {
            kind: self.kind,
            name: name.clone(),
            namespace: resource.namespace.clone(),
            resource_version: ResourceVersion::new(resource.version.to_string()),
            annotations: resource.annotations.clone(),
        }
    }
}

#[async_trait]
impl ResourceCollection for InMemoryCollection {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn get(&self, name: &ResourceName) -> Result<ManagedResource, CollectionError> {
        let state = self.state();
        state
            .resources
            .get(name)
            .map(|r| self.snapshot(name, r))
            .ok_or_else(|| CollectionError::NotFound {
                kind: self.kind,
                name: name.clone(),
            })
    }

    async fn list(&self) -> Result<Vec<ManagedResource>, CollectionError> {
        let state = self.state();
        Ok(state
            .resources
            .iter()
            .map(|(name, r)| self.snapshot(name, r))
            .collect())
    }

    async fn patch_annotations(
        &self,
        name: &ResourceName,
        patch: &AnnotationPatch,
        precondition: Option<&ResourceVersion>,
    ) -> Result<(), CollectionError> {
        let mut state = self.state();
        let resource = state
            .resources
            .get_mut(name)
            .ok_or_else(|| CollectionError::NotFound {
                kind: self.kind,
                name: name.clone(),
            })?;

        if let Some(changes) = resource.concurrent_writes.pop_front() {
            resource.annotations.extend(changes);
            resource.version += 1;
        }

        if let Some(expected) = precondition {
            if expected.as_str() != resource.version.to_string() {
                return Err(CollectionError::Conflict {
                    kind: self.kind,
                    name: name.clone(),
                });
            }
        }

        patch.apply(&mut resource.annotations);
        resource.version += 1;
        state.patches += 1;
        Ok(())
    }
}
