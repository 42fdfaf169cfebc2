//! Newtype identifiers for managed resources and commands.
//!
//! Resource names, namespaces, and resource versions are all strings on the
//! wire. Wrapping each in its own type keeps a namespace from being passed
//! where a name is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// The `metadata.name` of an application or project.
    ResourceName
}

/// Longest `metadata.name` the API server accepts.
const MAX_RESOURCE_NAME_LEN: usize = 253;

impl ResourceName {
    /// Parses a user-supplied name, enforcing the DNS subdomain rule the API
    /// server applies to `metadata.name`.
    ///
    /// The result is safe to use as a single URL path segment.
    ///
    /// # Errors
    ///
    /// Returns a short reason when `value` is not a valid name.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        if value.is_empty() {
            return Err("name is empty");
        }
        if value.len() > MAX_RESOURCE_NAME_LEN {
            return Err("name is longer than 253 characters");
        }
        let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
        if !value.chars().all(|c| allowed(c) || c == '-' || c == '.') {
            return Err("name may only contain lowercase letters, digits, '-' and '.'");
        }
        let starts_and_ends_alphanumeric = value.starts_with(allowed) && value.ends_with(allowed);
        if !starts_and_ends_alphanumeric {
            return Err("name must start and end with a letter or digit");
        }
        Ok(Self(value.to_string()))
    }
}

string_id! {
    /// The `metadata.namespace` a resource lives in.
    Namespace
}

string_id! {
    /// The opaque `metadata.resourceVersion` used as a write precondition.
    ///
    /// Only compared for equality by the API server; never parsed.
    ResourceVersion
}

// ---------------------------------------------------------------------------

/// Identifies a single command execution.
///
/// Generated fresh for every inbound command and recorded on its tracing span
/// so the fetch, patch, and reply for one command can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Generates a new random command identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identifiers_are_rejected() {
        assert!(ResourceName::new("").is_none());
        assert!(Namespace::new(String::new()).is_none());
        assert_eq!(ResourceName::new("guestbook").unwrap().as_str(), "guestbook");
    }

    #[test]
    fn test_parse_accepts_dns_subdomains() {
        for good in ["guestbook", "my-app.prod", "a", "0-app-1"] {
            assert_eq!(ResourceName::parse(good).unwrap().as_str(), good);
        }
    }

    #[test]
    fn test_parse_rejects_names_that_escape_a_path_segment() {
        let too_long = "a".repeat(254);
        for bad in [
            "",
            ".",
            "..",
            "x/../../../../../api/v1/namespaces/kube-system/configmaps/cfg",
            "guestbook?dryRun=All",
            "guestbook#frag",
            "guest%2Fbook",
            "Guestbook",
            "-guestbook",
            "guestbook.",
            "guest book",
            too_long.as_str(),
        ] {
            assert!(ResourceName::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_command_ids_are_unique() {
        assert_ne!(CommandId::new_random(), CommandId::new_random());
    }
}
