//! HTTP server that feeds adapter-parsed commands to a [`CommandExecutor`].

use std::collections::BTreeSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use subscriptions::CommandExecutor;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::Adapter;

/// Errors from binding or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An adapter path was rejected at registration.
    #[error("cannot register adapter on '{path}': {reason}")]
    InvalidRoute {
        /// Requested path.
        path: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Routes each registered path to its adapter and every command to one executor.
///
/// ```ignore
/// let server = Server::new(executor).add_adapter("/commands", JsonAdapter)?;
/// server.serve(([0, 0, 0, 0], 8080).into()).await?;
/// ```
pub struct Server {
    executor: Arc<dyn CommandExecutor>,
    router: Router,
    paths: BTreeSet<String>,
}

const HEALTH_PATH: &str = "/healthz";

impl Server {
    /// Creates a server with only the `/healthz` route.
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            router: Router::new().route(HEALTH_PATH, get(|| async { "ok" })),
            paths: BTreeSet::from([HEALTH_PATH.to_string()]),
        }
    }

    /// Registers `adapter` for `POST` requests on `path`.
    ///
    /// `path` must be a literal absolute path; route parameters are not
    /// supported.
    ///
    /// # Errors
    ///
    /// [`ServerError::InvalidRoute`] if `path` is malformed or already taken.
    pub fn add_adapter<A: Adapter>(mut self, path: &str, adapter: A) -> Result<Self, ServerError> {
        let invalid = |reason: &'static str| ServerError::InvalidRoute {
            path: path.to_string(),
            reason,
        };
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }
        if path.contains([':', '*', '{', '}']) {
            return Err(invalid("path must not contain route parameters"));
        }
        if !self.paths.insert(path.to_string()) {
            return Err(invalid("path is already registered"));
        }

        let adapter: Arc<dyn Adapter> = Arc::new(adapter);
        let executor = Arc::clone(&self.executor);
        self.router = self.router.route(
            path,
            post(move |request: Request| handle(Arc::clone(&executor), Arc::clone(&adapter), request)),
        );
        info!(path, "adapter registered");
        Ok(self)
    }

    /// The assembled axum router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds `addr` and serves until the process exits.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Bind`] if the address is unavailable.
    /// - [`ServerError::Serve`] if the accept loop fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves on an already-bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// [`ServerError::Serve`] if the accept loop fails.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "bot server listening");
        }
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}

async fn handle(executor: Arc<dyn CommandExecutor>, adapter: Arc<dyn Adapter>, request: Request) -> Response {
    let command = match adapter.parse(request).await {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "rejected inbound command");
            return adapter.send_response(err.to_string());
        }
    };
    match executor.execute(command).await {
        Ok(reply) => adapter.send_response(reply),
        Err(err) => {
            warn!(error = %err, "command failed");
            adapter.send_response(format!("cannot execute command: {err}"))
        }
    }
}
