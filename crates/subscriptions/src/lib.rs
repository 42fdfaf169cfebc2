//! Notification subscription domain.
//!
//! Subscriptions are stored as annotations on Argo CD applications and
//! projects. This crate owns how recipient lists are encoded in those
//! annotations, how subscribe/unsubscribe rewrite them, the minimal patch
//! between two annotation states, and the lookup of what a recipient is
//! subscribed to. Infrastructure crates implement [`ResourceCollection`];
//! they never add subscription rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ResourceName`, `Namespace`, `CommandId`, etc.) |
//! | [`recipients`] | Recipient parsing, annotation keys, list codec, destination matching |
//! | [`annotations`] | Subscribe/unsubscribe mutation and [`AnnotationPatch`] diffing |
//! | [`resources`] | [`ManagedResource`] snapshots and [`ResourceKind`] |
//! | [`command`] | [`Command`] and its wire form [`RawCommand`] |
//! | [`repository`] | [`ResourceCollection`] port and [`SubscriptionRepository`] |
//! | [`router`] | [`CommandExecutor`] port and [`CommandRouter`] |
//! | `memory` | `InMemoryCollection` for tests (`test-support` feature) |
//! | [`errors`] | Error and retry-policy types |

pub mod annotations;
pub mod command;
pub mod errors;
pub mod identifiers;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod recipients;
pub mod repository;
pub mod resources;
pub mod router;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use annotations::{add_subscription, annotations_patch, remove_subscription, AnnotationMap, AnnotationPatch};
pub use command::{Command, ListSubscriptions, RawCommand, Target, UpdateSubscription};
pub use errors::{CollectionError, RetryPolicy, SubscriptionError};
pub use identifiers::{CommandId, Namespace, ResourceName, ResourceVersion};
#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryCollection;
pub use recipients::{
    annotation_key, encode_recipients, get_destinations, is_subscription_key,
    parse_destination_and_template, parse_recipients, validate_recipient, AnnotationKeySelector,
    Destination, ANNOTATION_KEY,
};
pub use repository::{
    ResourceCollection, SubscriptionRepository, UpdateOutcome, DEFAULT_MAX_CONFLICT_RETRIES,
};
pub use resources::{ManagedResource, ResourceKind};
pub use router::{format_subscriptions, CommandExecutor, CommandRouter, SUBSCRIPTION_UPDATED};
