//! Recipient parsing and the annotation encoding of recipient lists.
//!
//! A resource stores its subscribers in annotations. The default list lives
//! under [`ANNOTATION_KEY`]; trigger-scoped lists live under
//! `"<trigger>.<ANNOTATION_KEY>"`. Each value is a comma-separated list of
//! recipients of the form `service:address`, optionally followed by
//! `?template` to override the message template for that recipient.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AnnotationMap, SubscriptionError};

/// Base annotation key holding the default, trigger-agnostic recipient list.
pub const ANNOTATION_KEY: &str = "recipients.argocd-notifications.argoproj.io";

const LIST_SEPARATOR: char = ',';
const SERVICE_SEPARATOR: char = ':';
const TEMPLATE_SEPARATOR: char = '?';

// ---------------------------------------------------------------------------
// Recipient parser
// ---------------------------------------------------------------------------

/// The service + address part of a recipient, without any template override.
///
/// Subscriptions are matched by destination, so `slack:ops` and
/// `slack:ops?short` refer to the same place.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Notification service name (e.g. `"slack"`).
    pub service: String,
    /// Service-specific address (e.g. a channel name).
    pub address: String,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.service, SERVICE_SEPARATOR, self.address)
    }
}

/// Splits a recipient into its destination and optional template override.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidRecipient`] when the recipient is
/// empty, has no `service:` prefix, has an empty service or address, or ends
/// in a bare `?`.
pub fn parse_destination_and_template(
    recipient: &str,
) -> Result<(Destination, Option<String>), SubscriptionError> {
    let invalid = |reason: &'static str| SubscriptionError::InvalidRecipient {
        recipient: recipient.to_string(),
        reason,
    };

    let trimmed = recipient.trim();
    if trimmed.is_empty() {
        return Err(invalid("recipient is empty"));
    }

    let (destination, template) = match trimmed.split_once(TEMPLATE_SEPARATOR) {
        Some((_, "")) => return Err(invalid("template override is empty")),
        Some((destination, template)) => (destination, Some(template.to_string())),
        None => (trimmed, None),
    };

    let (service, address) = destination
        .split_once(SERVICE_SEPARATOR)
        .ok_or_else(|| invalid("expected '<service>:<address>'"))?;
    if service.is_empty() {
        return Err(invalid("service is empty"));
    }
    if address.is_empty() {
        return Err(invalid("address is empty"));
    }

    Ok((
        Destination {
            service: service.to_string(),
            address: address.to_string(),
        },
        template,
    ))
}

/// Returns the trimmed form of a recipient that is about to be stored.
///
/// A stored recipient must decode back to exactly itself, so on top of
/// [`parse_destination_and_template`] it may not contain the list separator.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidRecipient`] for anything that would not
/// round-trip through an annotation value.
pub fn validate_recipient(recipient: &str) -> Result<&str, SubscriptionError> {
    let trimmed = recipient.trim();
    if trimmed.contains(LIST_SEPARATOR) {
        return Err(SubscriptionError::InvalidRecipient {
            recipient: recipient.to_string(),
            reason: "recipient must not contain ','",
        });
    }
    parse_destination_and_template(trimmed)?;
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Annotation codec
// ---------------------------------------------------------------------------

/// Returns the annotation key holding the recipient list for `trigger`.
///
/// An empty trigger selects the default key.
pub fn annotation_key(trigger: &str) -> String {
    if trigger.is_empty() {
        ANNOTATION_KEY.to_string()
    } else {
        format!("{trigger}.{ANNOTATION_KEY}")
    }
}

/// Returns `true` if `key` holds a recipient list for any trigger.
pub fn is_subscription_key(key: &str) -> bool {
    if key == ANNOTATION_KEY {
        return true;
    }
    key.strip_suffix(ANNOTATION_KEY)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .is_some_and(|trigger| !trigger.is_empty())
}

/// Decodes an annotation value into its recipients, in stored order.
///
/// Blank entries (`"a,,b"`, trailing commas, whitespace) are skipped.
pub fn parse_recipients(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Encodes recipients back into an annotation value.
///
/// Returns `None` for an empty list: the key must be removed, never stored
/// with an empty value.
pub fn encode_recipients(recipients: &[String]) -> Option<String> {
    if recipients.is_empty() {
        None
    } else {
        Some(recipients.join(","))
    }
}

/// Which annotation keys a trigger filter selects when removing a recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKeySelector {
    /// An empty trigger selects the default key and every trigger-scoped key;
    /// a named trigger selects only its own key.
    #[default]
    AllScopes,
    /// Every trigger, empty or not, selects only [`annotation_key`]`(trigger)`.
    ExactScope,
}

impl AnnotationKeySelector {
    /// Returns the keys of `annotations` selected for `trigger`, in map order.
    pub fn annotation_keys(self, annotations: &AnnotationMap, trigger: &str) -> Vec<String> {
        let exact = annotation_key(trigger);
        annotations
            .keys()
            .filter(|k| match self {
                Self::AllScopes if trigger.is_empty() => is_subscription_key(k),
                Self::AllScopes | Self::ExactScope => **k == exact,
            })
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Destination matcher
// ---------------------------------------------------------------------------

/// Collects every destination subscribed to a resource under any trigger.
///
/// # Errors
///
/// Fails on the first recipient that does not parse. A listing must not
/// silently under-report, so malformed state aborts the whole scan.
pub fn get_destinations(
    annotations: &AnnotationMap,
) -> Result<BTreeSet<Destination>, SubscriptionError> {
    let mut destinations = BTreeSet::new();
    for (_, value) in annotations.iter().filter(|(k, _)| is_subscription_key(k)) {
        for recipient in parse_recipients(value) {
            let (destination, _) = parse_destination_and_template(&recipient)?;
            destinations.insert(destination);
        }
    }
    Ok(destinations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> AnnotationMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn dest(service: &str, address: &str) -> Destination {
        Destination {
            service: service.into(),
            address: address.into(),
        }
    }

    #[test]
    fn test_parse_destination_without_template() {
        let (d, template) = parse_destination_and_template("slack:ops").unwrap();
        assert_eq!(d, dest("slack", "ops"));
        assert_eq!(template, None);
    }

    #[test]
    fn test_parse_destination_with_template() {
        let (d, template) = parse_destination_and_template(" email:dev@example.com?digest ").unwrap();
        assert_eq!(d, dest("email", "dev@example.com"));
        assert_eq!(template.as_deref(), Some("digest"));
    }

    #[test]
    fn test_address_may_contain_separator() {
        let (d, _) = parse_destination_and_template("webhook:http://hooks/1").unwrap();
        assert_eq!(d, dest("webhook", "http://hooks/1"));
    }

    #[test]
    fn test_malformed_recipients_are_rejected() {
        for bad in ["", "   ", "slack", ":ops", "slack:", "slack:ops?"] {
            let err = parse_destination_and_template(bad).unwrap_err();
            assert!(
                matches!(err, SubscriptionError::InvalidRecipient { .. }),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_validate_recipient_trims() {
        assert_eq!(validate_recipient("  slack:ops \t").unwrap(), "slack:ops");
        assert_eq!(validate_recipient("slack:ops?short").unwrap(), "slack:ops?short");
    }

    #[test]
    fn test_validate_recipient_rejects_unstorable_values() {
        for bad in ["", "  ", "garbage", "slack:a,slack:a", "slack:a,", "slack:ops?"] {
            let err = validate_recipient(bad).unwrap_err();
            assert!(
                matches!(err, SubscriptionError::InvalidRecipient { .. }),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_annotation_key_for_trigger() {
        assert_eq!(annotation_key(""), ANNOTATION_KEY);
        assert_eq!(
            annotation_key("on-sync-failed"),
            "on-sync-failed.recipients.argocd-notifications.argoproj.io"
        );
    }

    #[test]
    fn test_is_subscription_key() {
        assert!(is_subscription_key(ANNOTATION_KEY));
        assert!(is_subscription_key(&annotation_key("on-deployed")));
        assert!(!is_subscription_key(&format!(".{ANNOTATION_KEY}")));
        assert!(!is_subscription_key(&format!("x{ANNOTATION_KEY}")));
        assert!(!is_subscription_key("kubectl.kubernetes.io/last-applied-configuration"));
    }

    #[test]
    fn test_parse_recipients_skips_blanks() {
        assert!(parse_recipients("").is_empty());
        assert_eq!(
            parse_recipients("slack:a, ,slack:b,"),
            vec!["slack:a".to_string(), "slack:b".to_string()]
        );
    }

    #[test]
    fn test_encode_empty_list_is_absent() {
        assert_eq!(encode_recipients(&[]), None);
        assert_eq!(
            encode_recipients(&["slack:a".into(), "slack:b".into()]).as_deref(),
            Some("slack:a,slack:b")
        );
    }

    #[test]
    fn test_all_scopes_selector_with_empty_trigger_matches_every_list() {
        let annotations = map(&[
            (ANNOTATION_KEY, "slack:a"),
            ("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:a"),
            ("unrelated", "x"),
        ]);
        let keys = AnnotationKeySelector::AllScopes.annotation_keys(&annotations, "");
        assert_eq!(keys.len(), 2);

        let keys = AnnotationKeySelector::AllScopes.annotation_keys(&annotations, "on-deployed");
        assert_eq!(keys, vec![annotation_key("on-deployed")]);
    }

    #[test]
    fn test_exact_scope_selector_with_empty_trigger_matches_default_only() {
        let annotations = map(&[
            (ANNOTATION_KEY, "slack:a"),
            ("on-deployed.recipients.argocd-notifications.argoproj.io", "slack:a"),
        ]);
        let keys = AnnotationKeySelector::ExactScope.annotation_keys(&annotations, "");
        assert_eq!(keys, vec![ANNOTATION_KEY.to_string()]);
    }

    #[test]
    fn test_get_destinations_unions_across_triggers() {
        let annotations = map(&[
            (ANNOTATION_KEY, "slack:ops,email:dev@example.com"),
            ("on-sync-failed.recipients.argocd-notifications.argoproj.io", "slack:ops?short"),
            ("unrelated", "not:a:recipient"),
        ]);
        let destinations = get_destinations(&annotations).unwrap();
        assert_eq!(destinations.len(), 2);
        assert!(destinations.contains(&dest("slack", "ops")));
        assert!(destinations.contains(&dest("email", "dev@example.com")));
    }

    #[test]
    fn test_get_destinations_fails_on_malformed_recipient() {
        let annotations = map(&[(ANNOTATION_KEY, "slack:ops,garbage")]);
        assert!(matches!(
            get_destinations(&annotations),
            Err(SubscriptionError::InvalidRecipient { .. })
        ));
    }
}
