//! JSON shapes exchanged with the API server.
//!
//! Only the fields this crate reads or writes are modelled; everything else
//! in the Argo CD objects is ignored on decode and never sent on patch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use subscriptions::{AnnotationPatch, ManagedResource, Namespace, ResourceKind, ResourceName, ResourceVersion};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Object {
    pub metadata: ObjectMeta,
}

impl Object {
    /// Converts to the domain snapshot. Objects without a name are dropped.
    pub fn into_resource(self, kind: ResourceKind) -> Option<ManagedResource> {
        let ObjectMeta {
            name,
            namespace,
            resource_version,
            annotations,
        } = self.metadata;
        Some(ManagedResource {
            kind,
            name: ResourceName::new(name)?,
            namespace: namespace.and_then(Namespace::new),
            resource_version: resource_version.and_then(ResourceVersion::new),
            annotations: annotations.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListMeta {
    #[serde(default, rename = "continue")]
    pub continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<Object>,
}

/// `metav1.Status`, returned on most error responses.
#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchMeta<'a> {
    annotations: &'a AnnotationPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_version: Option<&'a str>,
}

/// JSON merge patch touching only `metadata.annotations`.
///
/// Including `resourceVersion` makes the API server reject the patch with
/// 409 Conflict if the object changed since it was read.
#[derive(Debug, Serialize)]
pub(crate) struct MergePatch<'a> {
    metadata: PatchMeta<'a>,
}

impl<'a> MergePatch<'a> {
    pub fn new(annotations: &'a AnnotationPatch, precondition: Option<&'a ResourceVersion>) -> Self {
        Self {
            metadata: PatchMeta {
                annotations,
                resource_version: precondition.map(ResourceVersion::as_str),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use subscriptions::{annotations_patch, AnnotationMap, ANNOTATION_KEY};

    #[test]
    fn test_object_decodes_to_resource() {
        let object: Object = serde_json::from_value(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": {
                "name": "guestbook",
                "namespace": "argocd",
                "resourceVersion": "4711",
                "annotations": { ANNOTATION_KEY: "slack:ops" }
            },
            "spec": { "project": "default" }
        }))
        .unwrap();

        let resource = object.into_resource(ResourceKind::Application).unwrap();
        assert_eq!(resource.identity(), "argocd/guestbook");
        assert_eq!(resource.resource_version.unwrap().as_str(), "4711");
        assert_eq!(resource.annotations[ANNOTATION_KEY], "slack:ops");
    }

    #[test]
    fn test_object_without_annotations() {
        let object: Object = serde_json::from_value(json!({
            "metadata": { "name": "default", "namespace": "argocd", "annotations": null }
        }))
        .unwrap();
        let resource = object.into_resource(ResourceKind::Project).unwrap();
        assert!(resource.annotations.is_empty());
        assert!(resource.resource_version.is_none());
    }

    #[test]
    fn test_list_continue_token() {
        let list: ObjectList = serde_json::from_value(json!({
            "metadata": { "continue": "abc" },
            "items": [ { "metadata": { "name": "a" } } ]
        }))
        .unwrap();
        assert_eq!(list.metadata.continue_token.as_deref(), Some("abc"));
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn test_merge_patch_body() {
        let mut old = AnnotationMap::new();
        old.insert(ANNOTATION_KEY.to_string(), "slack:ops".to_string());
        let mut new = AnnotationMap::new();
        new.insert("on-deployed.".to_string() + ANNOTATION_KEY, "slack:ops".to_string());
        let patch = annotations_patch(&old, &new);
        let version = ResourceVersion::new("12").unwrap();

        let body = serde_json::to_value(MergePatch::new(&patch, Some(&version))).unwrap();
        assert_eq!(
            body,
            json!({
                "metadata": {
                    "annotations": {
                        ANNOTATION_KEY: null,
                        "on-deployed.recipients.argocd-notifications.argoproj.io": "slack:ops"
                    },
                    "resourceVersion": "12"
                }
            })
        );
    }

    #[test]
    fn test_merge_patch_without_precondition_omits_version() {
        let patch = AnnotationPatch::default();
        let body = serde_json::to_value(MergePatch::new(&patch, None)).unwrap();
        assert_eq!(body, json!({ "metadata": { "annotations": {} } }));
    }
}
