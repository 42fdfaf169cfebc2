//! Subscription mutation over annotation maps and the minimal patch between two maps.
//!
//! All functions here are pure: they take the caller's map by reference and
//! return a fresh one. The repository diffs the fetched snapshot against the
//! result and only writes the keys that changed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::recipients::{annotation_key, encode_recipients, parse_recipients};
use crate::AnnotationKeySelector;

/// A resource's `metadata.annotations`.
pub type AnnotationMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Subscription mutator
// ---------------------------------------------------------------------------

/// Adds `recipient` to the list stored under the key for `trigger`.
///
/// Appends at the end; a recipient already in that list is left where it is.
pub fn add_subscription(annotations: &AnnotationMap, recipient: &str, trigger: &str) -> AnnotationMap {
    let mut annotations = annotations.clone();
    let key = annotation_key(trigger);
    let mut recipients = annotations
        .get(&key)
        .map(|v| parse_recipients(v))
        .unwrap_or_default();
    if !recipients.iter().any(|r| r == recipient) {
        recipients.push(recipient.to_string());
        if let Some(value) = encode_recipients(&recipients) {
            annotations.insert(key, value);
        }
    }
    annotations
}

/// Removes `recipient` from every list `selector` picks for `trigger`.
///
/// A list that becomes empty has its key removed rather than set to `""`.
pub fn remove_subscription(
    annotations: &AnnotationMap,
    recipient: &str,
    trigger: &str,
    selector: AnnotationKeySelector,
) -> AnnotationMap {
    let mut annotations = annotations.clone();
    for key in selector.annotation_keys(&annotations, trigger) {
        let mut recipients = parse_recipients(&annotations[&key]);
        let Some(index) = recipients.iter().position(|r| r == recipient) else {
            continue;
        };
        recipients.remove(index);
        match encode_recipients(&recipients) {
            Some(value) => {
                annotations.insert(key, value);
            }
            None => {
                annotations.remove(&key);
            }
        }
    }
    annotations
}

// ---------------------------------------------------------------------------
// Patch diff
// ---------------------------------------------------------------------------

/// The key-level changes that turn one annotation map into another.
///
/// `Some(value)` sets a key, `None` deletes it. Serialises to the shape a JSON
/// merge patch expects for `metadata.annotations`, with deletions as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationPatch(BTreeMap<String, Option<String>>);

impl AnnotationPatch {
    /// Returns `true` if applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys touched.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(key, change)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Applies the patch to `annotations` in place.
    pub fn apply(&self, annotations: &mut AnnotationMap) {
        for (key, change) in &self.0 {
            match change {
                Some(value) => {
                    annotations.insert(key.clone(), value.clone());
                }
                None => {
                    annotations.remove(key);
                }
            }
        }
    }
}

/// Computes the minimal patch from `old` to `new`.
///
/// Contains every key whose presence or value differs and no other key.
pub fn annotations_patch(old: &AnnotationMap, new: &AnnotationMap) -> AnnotationPatch {
    let mut patch = BTreeMap::new();
    for (key, value) in new {
        if old.get(key) != Some(value) {
            patch.insert(key.clone(), Some(value.clone()));
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            patch.insert(key.clone(), None);
        }
    }
    AnnotationPatch(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANNOTATION_KEY;

    fn map(entries: &[(&str, &str)]) -> AnnotationMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_subscribe_then_unsubscribe_default_trigger() {
        let empty = AnnotationMap::new();

        let subscribed = add_subscription(&empty, "slack:ops", "");
        assert_eq!(subscribed, map(&[(ANNOTATION_KEY, "slack:ops")]));

        let again = add_subscription(&subscribed, "slack:ops", "");
        assert_eq!(again, subscribed);

        let removed =
            remove_subscription(&again, "slack:ops", "", AnnotationKeySelector::AllScopes);
        assert!(!removed.contains_key(ANNOTATION_KEY));
        assert!(removed.is_empty());
    }

    #[test]
    fn test_add_does_not_mutate_input() {
        let original = map(&[("team", "platform")]);
        let updated = add_subscription(&original, "slack:ops", "on-deployed");
        assert_eq!(original, map(&[("team", "platform")]));
        assert_eq!(
            updated.get("on-deployed.recipients.argocd-notifications.argoproj.io"),
            Some(&"slack:ops".to_string())
        );
    }

    #[test]
    fn test_add_appends_preserving_order_without_duplicates() {
        let mut annotations = AnnotationMap::new();
        for recipient in ["slack:a", "slack:b", "slack:a", "slack:c", "slack:b"] {
            annotations = add_subscription(&annotations, recipient, "");
        }
        assert_eq!(annotations[ANNOTATION_KEY], "slack:a,slack:b,slack:c");
    }

    #[test]
    fn test_remove_keeps_remaining_recipients() {
        let annotations = map(&[(ANNOTATION_KEY, "slack:a,slack:b,slack:c")]);
        let removed =
            remove_subscription(&annotations, "slack:b", "", AnnotationKeySelector::AllScopes);
        assert_eq!(removed[ANNOTATION_KEY], "slack:a,slack:c");
    }

    #[test]
    fn test_remove_with_empty_trigger_strips_every_scope() {
        let annotations = map(&[
            (ANNOTATION_KEY, "slack:ops"),
            ("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:ops,slack:dev"),
        ]);
        let removed =
            remove_subscription(&annotations, "slack:ops", "", AnnotationKeySelector::AllScopes);
        assert_eq!(
            removed,
            map(&[("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:dev")])
        );
    }

    #[test]
    fn test_remove_with_exact_scope_leaves_trigger_lists() {
        let annotations = map(&[
            (ANNOTATION_KEY, "slack:ops"),
            ("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:ops"),
        ]);
        let removed =
            remove_subscription(&annotations, "slack:ops", "", AnnotationKeySelector::ExactScope);
        assert_eq!(
            removed,
            map(&[("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:ops")])
        );
    }

    #[test]
    fn test_remove_absent_recipient_is_noop() {
        let annotations = map(&[(ANNOTATION_KEY, "slack:a"), ("team", "platform")]);
        let removed =
            remove_subscription(&annotations, "slack:zzz", "", AnnotationKeySelector::AllScopes);
        assert_eq!(removed, annotations);
        assert!(annotations_patch(&annotations, &removed).is_empty());
    }

    #[test]
    fn test_patch_of_identical_maps_is_empty() {
        let annotations = map(&[(ANNOTATION_KEY, "slack:a"), ("team", "platform")]);
        assert!(annotations_patch(&annotations, &annotations).is_empty());
        assert!(annotations_patch(&AnnotationMap::new(), &AnnotationMap::new()).is_empty());
    }

    #[test]
    fn test_patch_contains_exactly_changed_keys() {
        let old = map(&[("kept", "1"), ("changed", "a"), ("removed", "x")]);
        let new = map(&[("kept", "1"), ("changed", "b"), ("added", "y")]);
        let patch = annotations_patch(&old, &new);

        let entries: Vec<_> = patch.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("added", Some("y")),
                ("changed", Some("b")),
                ("removed", None),
            ]
        );

        let mut applied = old.clone();
        patch.apply(&mut applied);
        assert_eq!(applied, new);
    }

    #[test]
    fn test_patch_serialises_deletions_as_null() {
        let old = map(&[(ANNOTATION_KEY, "slack:a")]);
        let patch = annotations_patch(&old, &AnnotationMap::new());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ ANNOTATION_KEY: null }));
    }
}
