//! Errors raised while setting up the Kubernetes client.
//!
//! Failures of individual API calls are reported through
//! [`subscriptions::CollectionError`] instead, since that is what the
//! repository understands.

use std::path::PathBuf;

use thiserror::Error;

/// Client construction and credential errors.
#[derive(Debug, Error)]
pub enum KubeError {
    /// A required in-cluster environment variable is unset.
    #[error("not running in a cluster: {0} is not set")]
    NotInCluster(&'static str),

    /// A credential or namespace file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The CA bundle is not valid PEM.
    #[error("invalid CA certificate: {0}")]
    InvalidCertificate(#[source] reqwest::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Configuration values are inconsistent.
    #[error("invalid Kubernetes configuration: {0}")]
    InvalidConfig(String),
}
