//! The contract between a transport and the command server.
//!
//! An [`Adapter`] turns an inbound HTTP request into a [`Command`] and wraps
//! the plain-text result back into a response. Chat-platform adapters
//! (Slack, Teams, ...) implement this trait outside this crate; the
//! [`JsonAdapter`] shipped here accepts a structured JSON command.

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use subscriptions::{Command, RawCommand, SubscriptionError};
use thiserror::Error;

/// Largest request body an adapter will buffer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Why a request could not be turned into a command.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request declared a content type the adapter does not accept.
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    /// The body could not be read or decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The body decoded but did not describe exactly one operation.
    #[error(transparent)]
    Command(#[from] SubscriptionError),
}

/// Converts between one transport's requests and [`Command`]s.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Extracts the command carried by `request`.
    async fn parse(&self, request: Request) -> Result<Command, AdapterError>;

    /// Wraps a reply (result or error text) for the caller.
    fn send_response(&self, text: String) -> Response;
}

/// Accepts `application/json` bodies shaped like [`RawCommand`] and replies
/// with `text/plain`.
///
/// ```json
/// {"recipient": "slack:ops", "subscribe": {"app": "guestbook", "trigger": "on-sync-failed"}}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

#[async_trait]
impl Adapter for JsonAdapter {
    async fn parse(&self, request: Request) -> Result<Command, AdapterError> {
        if let Some(content_type) = request.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with("application/json") {
                return Err(AdapterError::UnsupportedContentType(content_type.to_string()));
            }
        }
        let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| AdapterError::InvalidBody(e.to_string()))?;
        let raw: RawCommand =
            serde_json::from_slice(&body).map_err(|e| AdapterError::InvalidBody(e.to_string()))?;
        Ok(Command::try_from(raw)?)
    }

    fn send_response(&self, text: String) -> Response {
        ([(CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()
    }
}
