//! Kubernetes infrastructure adapter.
//!
//! Implements [`subscriptions::ResourceCollection`] for Argo CD `Application`
//! and `AppProject` custom resources by talking to the API server directly
//! over HTTPS with `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL layout, authentication, TLS trust, pagination, and
//! the mapping of HTTP status codes onto [`subscriptions::CollectionError`]
//! live here. The [`subscriptions`] crate sees only the port trait.
//!
//! ## Writes
//!
//! Annotation changes are sent as JSON merge patches carrying the
//! `resourceVersion` read beforehand, so a concurrent modification surfaces
//! as [`subscriptions::CollectionError::Conflict`] and the repository retries.

mod client;
mod config;
mod error;
mod wire;

pub use client::{resource_plural, KubeClient, KubeCollection};
pub use config::{KubeConfig, TokenSource, SERVICE_ACCOUNT_DIR};
pub use error::KubeError;
