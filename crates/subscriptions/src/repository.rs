//! Subscription operations bound to one resource collection.
//!
//! [`ResourceCollection`] is the port the infrastructure implements (the
//! Kubernetes adapter in production, `InMemoryCollection` in tests).
//! [`SubscriptionRepository`] is generic over it and is instantiated once for
//! applications and once for projects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::annotations::{add_subscription, annotations_patch, remove_subscription, AnnotationPatch};
use crate::recipients::{get_destinations, validate_recipient, AnnotationKeySelector, Destination};
use crate::{
    CollectionError, ManagedResource, ResourceKind, ResourceName, ResourceVersion, RetryPolicy,
    SubscriptionError,
};

/// Default number of extra attempts after a version conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Read and patch access to one collection of managed resources.
#[async_trait]
pub trait ResourceCollection: Send + Sync {
    /// Which collection this is.
    fn kind(&self) -> ResourceKind;

    /// Fetches a resource by name.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotFound`] if it does not exist,
    /// [`CollectionError::Remote`] on any other failure.
    async fn get(&self, name: &ResourceName) -> Result<ManagedResource, CollectionError>;

    /// Lists every resource in the collection.
    async fn list(&self) -> Result<Vec<ManagedResource>, CollectionError>;

    /// Applies `patch` to the resource's annotations.
    ///
    /// When `precondition` is set the write must fail with
    /// [`CollectionError::Conflict`] if the stored version differs.
    async fn patch_annotations(
        &self,
        name: &ResourceName,
        patch: &AnnotationPatch,
        precondition: Option<&ResourceVersion>,
    ) -> Result<(), CollectionError>;
}

#[async_trait]
impl<T: ResourceCollection + ?Sized> ResourceCollection for Arc<T> {
    fn kind(&self) -> ResourceKind {
        (**self).kind()
    }

    async fn get(&self, name: &ResourceName) -> Result<ManagedResource, CollectionError> {
        (**self).get(name).await
    }

    async fn list(&self) -> Result<Vec<ManagedResource>, CollectionError> {
        (**self).list().await
    }

    async fn patch_annotations(
        &self,
        name: &ResourceName,
        patch: &AnnotationPatch,
        precondition: Option<&ResourceVersion>,
    ) -> Result<(), CollectionError> {
        (**self).patch_annotations(name, patch, precondition).await
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Result of a subscribe or unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The annotations already had the requested state; nothing was written.
    Unchanged,
    /// A patch touching `keys` annotation keys was written.
    Patched {
        /// Number of annotation keys in the patch.
        keys: usize,
    },
}

/// Subscription operations against a single [`ResourceCollection`].
#[derive(Debug)]
pub struct SubscriptionRepository<C> {
    collection: C,
    selector: AnnotationKeySelector,
    max_conflict_retries: u32,
}

impl<C: ResourceCollection> SubscriptionRepository<C> {
    /// Creates a repository with the default key selector and retry bound.
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            selector: AnnotationKeySelector::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// Sets which annotation keys an unsubscribe touches.
    #[must_use]
    pub fn with_key_selector(mut self, selector: AnnotationKeySelector) -> Self {
        self.selector = selector;
        self
    }

    /// Sets how many times a conflicting write is re-read and re-applied.
    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// The collection this repository is bound to.
    pub fn kind(&self) -> ResourceKind {
        self.collection.kind()
    }

    /// Adds or removes `recipient` on the named resource.
    ///
    /// Writes only when the annotations actually change, and only the keys
    /// that changed. A write rejected because the resource moved on since it
    /// was read is retried against a fresh read.
    ///
    /// The recipient is trimmed before use.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::InvalidRecipient`] if the recipient could not be
    ///   stored and read back; nothing is fetched in that case.
    /// - [`SubscriptionError::NotFound`] if the resource does not exist.
    /// - [`SubscriptionError::ConflictRetriesExhausted`] if every attempt conflicted.
    /// - [`SubscriptionError::RemoteFailure`] for any other collection failure.
    #[instrument(skip(self), fields(kind = %self.collection.kind()))]
    pub async fn update_subscription(
        &self,
        recipient: &str,
        subscribe: bool,
        name: &ResourceName,
        trigger: &str,
    ) -> Result<UpdateOutcome, SubscriptionError> {
        let recipient = validate_recipient(recipient)?;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let resource = self.collection.get(name).await?;
            let updated = if subscribe {
                add_subscription(&resource.annotations, recipient, trigger)
            } else {
                remove_subscription(&resource.annotations, recipient, trigger, self.selector)
            };

            let patch = annotations_patch(&resource.annotations, &updated);
            if patch.is_empty() {
                debug!("annotations already up to date");
                return Ok(UpdateOutcome::Unchanged);
            }

            let written = self
                .collection
                .patch_annotations(name, &patch, resource.resource_version.as_ref())
                .await;
            match written {
                Ok(()) => {
                    info!(keys = patch.len(), attempt, "subscription annotations patched");
                    return Ok(UpdateOutcome::Patched { keys: patch.len() });
                }
                Err(err) if err.retry_policy() == RetryPolicy::Retryable => {
                    if attempt > self.max_conflict_retries {
                        return Err(SubscriptionError::ConflictRetriesExhausted {
                            kind: self.collection.kind(),
                            name: name.clone(),
                            attempts: attempt,
                        });
                    }
                    warn!(attempt, error = %err, "write conflicted, re-reading resource");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns the `namespace/name` of every resource subscribed to `destination`.
    ///
    /// # Errors
    ///
    /// Fails if the list call fails or any resource carries a malformed recipient.
    #[instrument(skip_all, fields(kind = %self.collection.kind(), %destination))]
    pub async fn subscribed_resources(
        &self,
        destination: &Destination,
    ) -> Result<Vec<String>, SubscriptionError> {
        let resources = self.collection.list().await?;
        let mut matched = Vec::new();
        for resource in &resources {
            if get_destinations(&resource.annotations)?.contains(destination) {
                matched.push(resource.identity());
            }
        }
        debug!(scanned = resources.len(), matched = matched.len(), "scanned collection");
        Ok(matched)
    }
}
