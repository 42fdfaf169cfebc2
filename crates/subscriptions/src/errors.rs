//! Error and retry-policy types for the subscription domain.
//!
//! [`SubscriptionError`] is what a command ultimately fails with; it is
//! rendered to the caller as plain text by the bot adapter. [`CollectionError`]
//! is the error surface of the [`crate::ResourceCollection`] port and is
//! wrapped into [`SubscriptionError::RemoteFailure`] when it escapes the
//! repository.
//!
//! [`RetryPolicy`] lets the repository decide whether a failed write may be
//! re-attempted after re-reading the resource.

use thiserror::Error;

use crate::{ResourceKind, ResourceName};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// The operation may be retried immediately after re-reading the resource.
    Retryable,
    /// The operation must not be retried; the command fails.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Collection errors
// ---------------------------------------------------------------------------

/// Errors produced by a [`crate::ResourceCollection`] implementation.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The named resource does not exist in the collection.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Collection the lookup was made against.
        kind: ResourceKind,
        /// Name that was looked up.
        name: ResourceName,
    },

    /// The write precondition did not hold: the resource changed after it was read.
    #[error("{kind} '{name}' was modified concurrently")]
    Conflict {
        /// Collection the write was made against.
        kind: ResourceKind,
        /// Name of the resource whose version moved.
        name: ResourceName,
    },

    /// Any other failure talking to the backing store.
    #[error("{operation} on {kind} failed: {message}")]
    Remote {
        /// Collection the call was made against.
        kind: ResourceKind,
        /// `"get"`, `"list"`, or `"patch"`.
        operation: &'static str,
        /// Transport- or server-supplied description.
        message: String,
    },
}

impl CollectionError {
    /// Only version conflicts are worth re-reading and re-applying.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Conflict { .. } => RetryPolicy::Retryable,
            Self::NotFound { .. } | Self::Remote { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Command-level errors
// ---------------------------------------------------------------------------

/// Errors a subscription command can fail with.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// A recipient string could not be decomposed into a destination.
    #[error("invalid recipient '{recipient}': {reason}")]
    InvalidRecipient {
        /// The offending recipient string.
        recipient: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// Neither an application nor a project name was supplied.
    #[error("either application or project name must be specified")]
    MissingTarget,

    /// A target name is not something the API server would accept.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidResourceName {
        /// Collection the name was meant for.
        kind: ResourceKind,
        /// The rejected name.
        name: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The targeted resource does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Collection that was searched.
        kind: ResourceKind,
        /// Name that was looked up.
        name: ResourceName,
    },

    /// The inbound command carried no operation.
    #[error("unknown command")]
    UnknownCommand,

    /// The inbound command carried more than one operation.
    #[error("ambiguous command: exactly one of list, subscribe, or unsubscribe must be set")]
    AmbiguousCommand,

    /// The resource kept changing underneath every write attempt.
    #[error("{kind} '{name}' was modified concurrently {attempts} times; giving up")]
    ConflictRetriesExhausted {
        /// Collection the writes were made against.
        kind: ResourceKind,
        /// Name of the contended resource.
        name: ResourceName,
        /// Total write attempts made.
        attempts: u32,
    },

    /// A get, list, or patch call against a collection failed.
    #[error(transparent)]
    RemoteFailure(CollectionError),
}

impl From<CollectionError> for SubscriptionError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::NotFound { kind, name } => Self::NotFound { kind, name },
            other => Self::RemoteFailure(other),
        }
    }
}
