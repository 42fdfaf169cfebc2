//! reqwest-backed access to the `argoproj.io/v1alpha1` custom resources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode, Url};
use subscriptions::{
    AnnotationPatch, CollectionError, ManagedResource, ResourceCollection, ResourceKind,
    ResourceName, ResourceVersion,
};
use tracing::{debug, instrument};

use crate::wire::{MergePatch, Object, ObjectList, Status};
use crate::{KubeConfig, KubeError, TokenSource};

const API_GROUP: &str = "argoproj.io";
const API_VERSION: &str = "v1alpha1";
const MERGE_PATCH: &str = "application/merge-patch+json";
const LIST_PAGE_SIZE: u32 = 500;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Plural resource name used in API paths.
pub fn resource_plural(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Application => "applications",
        ResourceKind::Project => "appprojects",
    }
}

/// Shared HTTP client and connection settings.
///
/// Cheap to clone; hand one [`KubeCollection`] per resource kind to the
/// repositories via [`KubeClient::collection`].
#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    config: Arc<KubeConfig>,
}

impl KubeClient {
    /// Builds the HTTP client, trusting `config.ca_file` if set.
    ///
    /// # Errors
    ///
    /// Fails if the CA bundle cannot be read or parsed, or the client cannot be built.
    pub fn new(config: KubeConfig) -> Result<Self, KubeError> {
        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(path) = &config.ca_file {
            let pem = std::fs::read(path).map_err(|source| KubeError::Io {
                path: path.clone(),
                source,
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(KubeError::InvalidCertificate)?;
            builder = builder.add_root_certificate(certificate);
        }
        let http = builder.build().map_err(KubeError::Client)?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// A collection view over one resource kind.
    pub fn collection(&self, kind: ResourceKind) -> KubeCollection {
        KubeCollection {
            client: self.clone(),
            kind,
        }
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        format!(
            "{}/apis/{API_GROUP}/{API_VERSION}/namespaces/{}/{}",
            self.config.api_server.trim_end_matches('/'),
            self.config.namespace,
            resource_plural(kind)
        )
    }

    async fn bearer_token(&self) -> Result<Option<String>, String> {
        match &self.config.token {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map(|t| Some(t.trim().to_string()))
                .map_err(|e| format!("failed to read token file {}: {e}", path.display())),
        }
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, String> {
        Ok(match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

/// One Argo CD resource kind in the configured namespace.
#[derive(Debug, Clone)]
pub struct KubeCollection {
    client: KubeClient,
    kind: ResourceKind,
}

impl KubeCollection {
    /// URL of one object; the name is always encoded as a single path segment.
    fn object_url(&self, operation: &'static str, name: &ResourceName) -> Result<Url, CollectionError> {
        let mut url = Url::parse(&self.client.collection_url(self.kind))
            .map_err(|e| self.remote(operation, format!("invalid API server URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| self.remote(operation, "API server URL cannot have a path"))?
            .push(name.as_str());
        Ok(url)
    }

    fn remote(&self, operation: &'static str, message: impl Into<String>) -> CollectionError {
        CollectionError::Remote {
            kind: self.kind,
            operation,
            message: message.into(),
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, CollectionError> {
        let request = self
            .client
            .authorized(request)
            .await
            .map_err(|message| self.remote(operation, message))?;
        let response = request
            .send()
            .await
            .map_err(|e| self.remote(operation, e.to_string()))?;
        debug!(kind = %self.kind, operation, status = %response.status(), "api server responded");
        Ok(response)
    }

    /// Turns a non-success response into the matching [`CollectionError`].
    async fn failure(
        &self,
        operation: &'static str,
        name: Option<&ResourceName>,
        response: Response,
    ) -> CollectionError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_failure(self.kind, operation, name, status, &body)
    }
}

/// Maps an error status to a [`CollectionError`].
///
/// 404 and 409 only mean "not found" and "conflict" when a specific object
/// was addressed; on a list they are plain remote failures.
pub(crate) fn classify_failure(
    kind: ResourceKind,
    operation: &'static str,
    name: Option<&ResourceName>,
    status: StatusCode,
    body: &str,
) -> CollectionError {
    match (status, name) {
        (StatusCode::NOT_FOUND, Some(name)) => CollectionError::NotFound {
            kind,
            name: name.clone(),
        },
        (StatusCode::CONFLICT, Some(name)) => CollectionError::Conflict {
            kind,
            name: name.clone(),
        },
        _ => {
            let detail = serde_json::from_str::<Status>(body)
                .ok()
                .and_then(|s| s.message)
                .unwrap_or_else(|| body.trim().to_string());
            let message = if detail.is_empty() {
                status.to_string()
            } else {
                format!("{status}: {detail}")
            };
            CollectionError::Remote {
                kind,
                operation,
                message,
            }
        }
    }
}

#[async_trait]
impl ResourceCollection for KubeCollection {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn get(&self, name: &ResourceName) -> Result<ManagedResource, CollectionError> {
        let request = self.client.http.get(self.object_url("get", name)?);
        let response = self.send("get", request).await?;
        if !response.status().is_success() {
            return Err(self.failure("get", Some(name), response).await);
        }
        let object: Object = response
            .json()
            .await
            .map_err(|e| self.remote("get", format!("invalid response body: {e}")))?;
        object
            .into_resource(self.kind)
            .ok_or_else(|| self.remote("get", "object has no name"))
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn list(&self) -> Result<Vec<ManagedResource>, CollectionError> {
        let url = self.client.collection_url(self.kind);
        let mut resources = Vec::new();
        let mut continue_token: Option<String> = None;
        loop {
            let mut query = vec![("limit", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = continue_token.take() {
                query.push(("continue", token));
            }
            let request = self.client.http.get(&url).query(&query);
            let response = self.send("list", request).await?;
            if !response.status().is_success() {
                return Err(self.failure("list", None, response).await);
            }
            let page: ObjectList = response
                .json()
                .await
                .map_err(|e| self.remote("list", format!("invalid response body: {e}")))?;
            resources.extend(page.items.into_iter().filter_map(|o| o.into_resource(self.kind)));
            match page.metadata.continue_token.filter(|t| !t.is_empty()) {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }
        Ok(resources)
    }

    #[instrument(skip(self, patch), fields(kind = %self.kind, keys = patch.len()))]
    async fn patch_annotations(
        &self,
        name: &ResourceName,
        patch: &AnnotationPatch,
        precondition: Option<&ResourceVersion>,
    ) -> Result<(), CollectionError> {
        let body = serde_json::to_vec(&MergePatch::new(patch, precondition))
            .map_err(|e| self.remote("patch", format!("failed to encode patch: {e}")))?;
        let request = self
            .client
            .http
            .patch(self.object_url("patch", name)?)
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body);
        let response = self.send("patch", request).await?;
        if !response.status().is_success() {
            return Err(self.failure("patch", Some(name), response).await);
        }
        Ok(())
    }
}
