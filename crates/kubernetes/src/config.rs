//! Connection settings for the Kubernetes API server.

use std::path::{Path, PathBuf};

use subscriptions::Namespace;

use crate::KubeError;

/// Directory the kubelet mounts the pod's service-account credentials into.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Where the bearer token for each request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// No `Authorization` header (e.g. talking through `kubectl proxy`).
    None,
    /// A fixed token.
    Static(String),
    /// A token file re-read on every request, so rotated projected tokens are picked up.
    File(PathBuf),
}

/// Everything needed to reach the Argo CD resources in one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfig {
    /// Base URL of the API server, e.g. `https://10.0.0.1:443`.
    pub api_server: String,
    /// Namespace holding the applications and projects.
    pub namespace: Namespace,
    /// Bearer token source.
    pub token: TokenSource,
    /// PEM bundle to trust in addition to the system roots.
    pub ca_file: Option<PathBuf>,
}

impl KubeConfig {
    /// Builds the configuration a pod gets from its service account.
    ///
    /// `namespace` overrides the pod's own namespace when given.
    ///
    /// # Errors
    ///
    /// [`KubeError::NotInCluster`] if the service environment variables are
    /// missing, [`KubeError::Io`] if the namespace file cannot be read.
    pub fn in_cluster(namespace: Option<Namespace>) -> Result<Self, KubeError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| KubeError::NotInCluster("KUBERNETES_SERVICE_HOST"))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .map_err(|_| KubeError::NotInCluster("KUBERNETES_SERVICE_PORT"))?;
        Self::from_service_account(&api_server_url(&host, &port), Path::new(SERVICE_ACCOUNT_DIR), namespace)
    }

    /// Builds a configuration from a service-account directory laid out like
    /// [`SERVICE_ACCOUNT_DIR`].
    ///
    /// # Errors
    ///
    /// [`KubeError::Io`] if `namespace` is `None` and the namespace file cannot
    /// be read; [`KubeError::InvalidConfig`] if it is empty.
    pub fn from_service_account(
        api_server: &str,
        dir: &Path,
        namespace: Option<Namespace>,
    ) -> Result<Self, KubeError> {
        let namespace = match namespace {
            Some(ns) => ns,
            None => {
                let path = dir.join("namespace");
                let raw = std::fs::read_to_string(&path).map_err(|source| KubeError::Io { path, source })?;
                Namespace::new(raw.trim())
                    .ok_or_else(|| KubeError::InvalidConfig("service-account namespace file is empty".into()))?
            }
        };
        let ca_file = dir.join("ca.crt");
        Ok(Self {
            api_server: api_server.to_string(),
            namespace,
            token: TokenSource::File(dir.join("token")),
            ca_file: ca_file.exists().then_some(ca_file),
        })
    }
}

fn api_server_url(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}
