//! Managed resource snapshots as seen through a [`crate::ResourceCollection`].

use serde::{Deserialize, Serialize};

use crate::{AnnotationMap, Namespace, ResourceName, ResourceVersion};

/// The two collections subscriptions can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// An Argo CD `Application`.
    Application,
    /// An Argo CD `AppProject`.
    Project,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// A read-only snapshot of one resource's identity and annotations.
///
/// Taken once per operation; never cached across commands.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedResource {
    /// Which collection the resource belongs to.
    pub kind: ResourceKind,
    /// `metadata.name`.
    pub name: ResourceName,
    /// `metadata.namespace`. `None` only for cluster-scoped test fixtures.
    pub namespace: Option<Namespace>,
    /// `metadata.resourceVersion` at the time of the read, if the store has one.
    pub resource_version: Option<ResourceVersion>,
    /// `metadata.annotations`; empty when the object has none.
    pub annotations: AnnotationMap,
}

impl ManagedResource {
    /// The `namespace/name` form used in listing replies.
    pub fn identity(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_includes_namespace() {
        let resource = ManagedResource {
            kind: ResourceKind::Application,
            name: ResourceName::new("guestbook").unwrap(),
            namespace: Namespace::new("argocd"),
            resource_version: None,
            annotations: AnnotationMap::new(),
        };
        assert_eq!(resource.identity(), "argocd/guestbook");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::Application.to_string(), "application");
        assert_eq!(ResourceKind::Project.to_string(), "project");
    }
}
